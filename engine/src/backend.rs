//! Persistence backend abstraction.
//!
//! The cache and the sync queue store JSON values in named tables through a
//! [`PersistenceBackend`]. Tables keep first-insertion order; overwriting a
//! key keeps its position.

use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Abstract keyed store.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Read one value.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>>;

    /// Insert or overwrite one value.
    async fn put(&self, table: &str, key: &str, value: Value) -> Result<()>;

    /// Delete one value. Returns true if it existed.
    async fn delete(&self, table: &str, key: &str) -> Result<bool>;

    /// All rows of a table, in first-insertion order.
    async fn scan(&self, table: &str) -> Result<Vec<(String, Value)>>;

    /// Names of all non-empty tables.
    async fn tables(&self) -> Result<Vec<String>>;

    /// Remove a table and everything in it.
    async fn drop_table(&self, table: &str) -> Result<()>;
}

/// One table: rows plus the insertion counter that orders them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    rows: BTreeMap<String, Row>,
    next_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Row {
    seq: u64,
    value: Value,
}

impl Table {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.rows.get(key).map(|row| &row.value)
    }

    pub fn put(&mut self, key: &str, value: Value) {
        if let Some(row) = self.rows.get_mut(key) {
            row.value = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(key.to_string(), Row { seq, value });
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.rows.remove(key).is_some()
    }

    pub fn scan(&self) -> Vec<(String, Value)> {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_by_key(|(_, row)| row.seq);
        rows.into_iter()
            .map(|(key, row)| (key.clone(), row.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Backend that keeps every table in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: DashMap<String, Table>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|t| t.value().get(key).cloned()))
    }

    async fn put(&self, table: &str, key: &str, value: Value) -> Result<()> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .put(key, value);
        Ok(())
    }

    async fn delete(&self, table: &str, key: &str) -> Result<bool> {
        let Some(mut t) = self.tables.get_mut(table) else {
            return Ok(false);
        };
        let removed = t.delete(key);
        let empty = t.is_empty();
        drop(t);
        if empty {
            self.tables.remove_if(table, |_, t| t.is_empty());
        }
        Ok(removed)
    }

    async fn scan(&self, table: &str) -> Result<Vec<(String, Value)>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.value().scan())
            .unwrap_or_default())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.tables.remove(table);
        Ok(())
    }
}
