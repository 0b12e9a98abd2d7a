//! Entity type for stored documents.

use crate::{Error, Result, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier field.
pub const ID_FIELD: &str = "_id";
/// Server-assigned metadata sub-object.
pub const METADATA_FIELD: &str = "_kmd";
/// Access-control descriptor.
pub const ACL_FIELD: &str = "_acl";
/// Marker inside the metadata for ids generated on this device.
const LOCAL_FIELD: &str = "local";

/// Metadata associated with an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Last modified time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lmt: Option<String>,
    /// Entity creation time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ect: Option<String>,
    /// Whether the id was generated locally and the entity was never created remotely
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
}

/// A JSON document with a `_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Create an empty entity.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::invalid_entity(format!(
                "entity must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The entity id, if present and a non-empty string.
    pub fn id(&self) -> Option<&str> {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// The entity id, or an error when it is missing.
    pub fn require_id(&self) -> Result<&str> {
        self.id()
            .ok_or_else(|| Error::invalid_entity("entity requires a non-empty _id"))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Parsed `_kmd`; malformed metadata reads as empty.
    pub fn metadata(&self) -> Metadata {
        self.0
            .get(METADATA_FIELD)
            .cloned()
            .and_then(|kmd| serde_json::from_value(kmd).ok())
            .unwrap_or_default()
    }

    pub fn acl(&self) -> Option<&Value> {
        self.0.get(ACL_FIELD)
    }

    /// True if the id was generated on this device.
    pub fn is_local(&self) -> bool {
        self.metadata().local
    }

    /// Assign a locally generated id if the entity has none.
    ///
    /// Returns true if an id was generated.
    pub fn ensure_id(&mut self) -> bool {
        if self.id().is_some() {
            return false;
        }
        self.set_id(uuid::Uuid::new_v4().simple().to_string());
        let kmd = self
            .0
            .entry(METADATA_FIELD.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !kmd.is_object() {
            *kmd = Value::Object(Map::new());
        }
        if let Value::Object(kmd) = kmd {
            kmd.insert(LOCAL_FIELD.to_string(), Value::Bool(true));
        }
        true
    }

    /// Body for creating this entity remotely: no local id, no local marker.
    pub fn to_create_body(&self) -> Value {
        let mut map = self.0.clone();
        if self.is_local() {
            map.remove(ID_FIELD);
        }
        if let Some(Value::Object(kmd)) = map.get_mut(METADATA_FIELD) {
            kmd.remove(LOCAL_FIELD);
            if kmd.is_empty() {
                map.remove(METADATA_FIELD);
            }
        }
        Value::Object(map)
    }

    /// Last modified time from `_kmd.lmt`.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        let lmt = self.metadata().lmt?;
        DateTime::parse_from_rfc3339(&lmt)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Last modified time in milliseconds since epoch.
    pub fn last_modified_millis(&self) -> Option<Timestamp> {
        self.last_modified()
            .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok())
    }

    /// Resolve a dotted path (`author.name`) into nested objects.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

impl TryFrom<Value> for Entity {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Entity::from_value(value)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        entity.into_value()
    }
}
