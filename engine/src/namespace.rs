//! Namespaces: a collection plus an optional tag.
//!
//! A namespace identifies one isolated local cache and sync queue. Tags let a
//! single device hold several independent copies of the same collection.

use crate::{CollectionName, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated tag: non-empty after trimming, only `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Validate and build a tag. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self> {
        let tag = raw.trim();
        if tag.is_empty() {
            return Err(Error::config("tag must be a non-empty string"));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "tag '{tag}' may only contain alphanumeric characters, '-' and '_'"
            )));
        }
        Ok(Self(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Tag::parse(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (collection, tag) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub collection: CollectionName,
    pub tag: Option<Tag>,
}

impl Namespace {
    /// Validate the collection name and build an untagged namespace.
    pub fn new(collection: &str) -> Result<Self> {
        Ok(Self {
            collection: validate_collection(collection)?,
            tag: None,
        })
    }

    pub fn tagged(collection: &str, tag: Tag) -> Result<Self> {
        Ok(Self {
            collection: validate_collection(collection)?,
            tag: Some(tag),
        })
    }

    pub fn tag_str(&self) -> Option<&str> {
        self.tag.as_ref().map(Tag::as_str)
    }

    /// Backend table name for this namespace under the given prefix.
    ///
    /// `<prefix>:<collection>` or `<prefix>:<collection>#<tag>`; collection
    /// names never contain `#` and tags never contain `:` or `#`.
    pub fn table(&self, prefix: &str) -> String {
        match &self.tag {
            Some(tag) => format!("{prefix}:{}#{tag}", self.collection),
            None => format!("{prefix}:{}", self.collection),
        }
    }

    /// Inverse of [`Namespace::table`]; `None` for tables of another prefix.
    pub fn from_table(prefix: &str, table: &str) -> Option<Self> {
        let rest = table.strip_prefix(prefix)?.strip_prefix(':')?;
        match rest.split_once('#') {
            Some((collection, tag)) => Some(Self {
                collection: collection.to_string(),
                tag: Tag::parse(tag).ok(),
            }),
            None => Some(Self {
                collection: rest.to_string(),
                tag: None,
            }),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}#{tag}", self.collection),
            None => f.write_str(&self.collection),
        }
    }
}

fn validate_collection(name: &str) -> Result<CollectionName> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::config("a collection name is required"));
    }
    if name.contains(['#', '/', '?']) {
        return Err(Error::config(format!(
            "collection name '{name}' contains a reserved character"
        )));
    }
    Ok(name.to_string())
}
