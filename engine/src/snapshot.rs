//! Snapshot-file persistence.
//!
//! [`SnapshotBackend`] keeps every table in memory and rewrites a single JSON
//! snapshot file after each mutation. Tables are held in `BTreeMap`s so the
//! file contents are deterministic.

use crate::backend::{PersistenceBackend, Table};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The persisted state of every table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Tables by name
    pub tables: BTreeMap<String, Table>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            tables: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Count rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::storage(format!("invalid snapshot: {e}")))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| Error::storage(format!("invalid snapshot: {e}")))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::storage(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Backend persisted to a JSON snapshot file.
#[derive(Debug)]
pub struct SnapshotBackend {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl SnapshotBackend {
    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read_to_string(&path).await {
            Ok(json) => Snapshot::from_json(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            rows = snapshot.row_count(),
            "Opened snapshot backend"
        );

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot to a temp file, then rename it over the target.
    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Persist `next`, then make it the live state. A failed write leaves
    /// both the file and the in-memory state untouched.
    async fn commit(&self, state: &mut Snapshot, next: Snapshot) -> Result<()> {
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for SnapshotBackend {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>> {
        let state = self.state.lock().await;
        Ok(state.tables.get(table).and_then(|t| t.get(key).cloned()))
    }

    async fn put(&self, table: &str, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.tables
            .entry(table.to_string())
            .or_default()
            .put(key, value);
        self.commit(&mut state, next).await
    }

    async fn delete(&self, table: &str, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.tables.get(table).is_some_and(|t| t.get(key).is_some()) {
            return Ok(false);
        }
        let mut next = state.clone();
        if let Some(t) = next.tables.get_mut(table) {
            t.delete(key);
            if t.is_empty() {
                next.tables.remove(table);
            }
        }
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    async fn scan(&self, table: &str) -> Result<Vec<(String, Value)>> {
        let state = self.state.lock().await;
        Ok(state.tables.get(table).map(Table::scan).unwrap_or_default())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.tables.contains_key(table) {
            return Ok(());
        }
        let mut next = state.clone();
        next.tables.remove(table);
        self.commit(&mut state, next).await
    }
}
