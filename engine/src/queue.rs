//! Sync queue.
//!
//! Tracks mutations made against offline-capable stores until the remote
//! confirms them. Entries are keyed by entity id, so at most one live entry
//! exists per entity: a newer mutation supersedes the queued one and moves to
//! the back of the queue.

use crate::backend::PersistenceBackend;
use crate::locks::NamespaceLocks;
use crate::{EntityId, Namespace, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Table prefix for queue entries.
pub const QUEUE_PREFIX: &str = "queue";

/// Unique identifier of a queue entry.
pub type EntryId = String;

/// The mutation a queue entry will replay against the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Upsert,
    Delete,
}

/// A pending mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    /// Unique per enqueue; a superseding entry gets a new id
    pub id: EntryId,
    pub namespace: Namespace,
    pub entity_id: EntityId,
    pub operation: SyncOperation,
    /// Commit order within the namespace
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

/// Ordered log of pending mutations per namespace.
#[derive(Clone)]
pub struct SyncQueue {
    backend: Arc<dyn PersistenceBackend>,
    locks: Arc<NamespaceLocks>,
}

impl SyncQueue {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(NamespaceLocks::new()),
        }
    }

    /// Record a mutation, superseding any queued entry for the same entity.
    pub async fn enqueue(
        &self,
        ns: &Namespace,
        entity_id: &str,
        operation: SyncOperation,
    ) -> Result<SyncEntry> {
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(QUEUE_PREFIX);
        let entries = self.load(&table).await?;

        let superseded = entries.iter().find(|e| e.entity_id == entity_id);
        if let Some(previous) = superseded {
            tracing::debug!(
                namespace = %ns,
                entity_id,
                previous = ?previous.operation,
                next = ?operation,
                "Coalescing queued mutation"
            );
            // Delete then re-insert so the entry moves to the back.
            self.backend.delete(&table, entity_id).await?;
        }

        let seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        let entry = SyncEntry {
            id: uuid::Uuid::new_v4().to_string(),
            namespace: ns.clone(),
            entity_id: entity_id.to_string(),
            operation,
            seq,
            created_at: Utc::now(),
        };
        self.backend
            .put(&table, entity_id, serde_json::to_value(&entry)?)
            .await?;

        tracing::debug!(namespace = %ns, entity_id, entry_id = %entry.id, op = ?operation, "Enqueued mutation");
        Ok(entry)
    }

    /// Pending entries of a namespace, oldest first.
    pub async fn pending(&self, ns: &Namespace) -> Result<Vec<SyncEntry>> {
        self.load(&ns.table(QUEUE_PREFIX)).await
    }

    /// The live entry for an entity, if any.
    pub async fn entry_for(&self, ns: &Namespace, entity_id: &str) -> Result<Option<SyncEntry>> {
        let entry = self
            .backend
            .get(&ns.table(QUEUE_PREFIX), entity_id)
            .await?
            .map(serde_json::from_value::<SyncEntry>)
            .transpose()?;
        Ok(entry)
    }

    /// True if `entry` is still the live entry for its entity.
    pub async fn is_live(&self, entry: &SyncEntry) -> Result<bool> {
        Ok(self
            .entry_for(&entry.namespace, &entry.entity_id)
            .await?
            .is_some_and(|live| live.id == entry.id))
    }

    pub async fn count(&self, ns: &Namespace) -> Result<usize> {
        Ok(self.backend.scan(&ns.table(QUEUE_PREFIX)).await?.len())
    }

    /// Remove an entry after the remote confirmed it.
    ///
    /// Only removes the entry if it is still the live one for its entity;
    /// returns false when a newer mutation superseded it meanwhile.
    pub async fn ack(&self, entry: &SyncEntry) -> Result<bool> {
        let ns = &entry.namespace;
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(QUEUE_PREFIX);
        let live: Option<SyncEntry> = self
            .backend
            .get(&table, &entry.entity_id)
            .await?
            .map(serde_json::from_value::<SyncEntry>)
            .transpose()?;

        match live {
            Some(live) if live.id == entry.id => {
                self.backend.delete(&table, &entry.entity_id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drop the entries of the given entities without applying them.
    pub async fn discard(&self, ns: &Namespace, entity_ids: &[EntityId]) -> Result<usize> {
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(QUEUE_PREFIX);
        let mut removed = 0;
        for id in entity_ids {
            if self.backend.delete(&table, id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop every entry of one namespace without applying it.
    pub async fn clear(&self, ns: &Namespace) -> Result<()> {
        let _guard = self.locks.lock(ns).await;
        self.backend.drop_table(&ns.table(QUEUE_PREFIX)).await
    }

    /// Drop every entry of every namespace.
    pub async fn clear_all(&self) -> Result<()> {
        let namespaces: Vec<Namespace> = self
            .backend
            .tables()
            .await?
            .iter()
            .filter_map(|table| Namespace::from_table(QUEUE_PREFIX, table))
            .collect();
        for ns in namespaces {
            self.clear(&ns).await?;
        }
        Ok(())
    }

    async fn load(&self, table: &str) -> Result<Vec<SyncEntry>> {
        let mut entries = self
            .backend
            .scan(table)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value::<SyncEntry>(value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }
}
