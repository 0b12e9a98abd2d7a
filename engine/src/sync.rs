//! Sync engine.
//!
//! Reconciles the local cache and sync queue with the remote collection:
//!
//! 1. **Push** replays queued mutations oldest first and stops at the first
//!    failure, so later mutations never overtake an earlier one.
//! 2. **Pull** fetches remote entities and merges them into the cache by id.
//!    The server copy always wins.
//! 3. **Sync** is push, then pull only if push drained the queue.

use crate::cache::CacheRepository;
use crate::entity::METADATA_FIELD;
use crate::locks::NamespaceLocks;
use crate::queue::{SyncEntry, SyncOperation, SyncQueue};
use crate::remote::RemoteCollection;
use crate::transport::Transport;
use crate::{Entity, Error, ErrorKind, Namespace, Query, Result};
use serde::Serialize;
use std::sync::Arc;

/// A queue entry that failed to push, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFailure {
    pub entry: SyncEntry,
    #[serde(serialize_with = "serialize_error")]
    pub error: Error,
}

fn serialize_error<S: serde::Serializer>(error: &Error, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&error.to_string())
}

/// Outcome of a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    /// Entries confirmed by the remote, in commit order
    pub pushed: Vec<SyncEntry>,
    /// The entry that stopped the push, if any
    pub errors: Vec<PushFailure>,
    /// Entries after the failed one that were not attempted; still queued
    pub unprocessed: Vec<SyncEntry>,
}

impl PushResult {
    pub fn pushed_count(&self) -> usize {
        self.pushed.len()
    }

    /// True if every pending entry was pushed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first failure, if the push stopped early.
    pub fn first_error(&self) -> Option<&PushFailure> {
        self.errors.first()
    }
}

/// Outcome of a sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub push: PushResult,
    /// Pulled entities; `None` when the push stopped early and pull was skipped
    pub pull: Option<Vec<Entity>>,
}

/// Orchestrates push and pull for any namespace.
#[derive(Clone)]
pub struct SyncEngine {
    cache: CacheRepository,
    queue: SyncQueue,
    transport: Arc<dyn Transport>,
    push_locks: Arc<NamespaceLocks>,
}

impl SyncEngine {
    pub fn new(cache: CacheRepository, queue: SyncQueue, transport: Arc<dyn Transport>) -> Self {
        Self {
            cache,
            queue,
            transport,
            push_locks: Arc::new(NamespaceLocks::new()),
        }
    }

    fn remote(&self, ns: &Namespace) -> RemoteCollection {
        RemoteCollection::new(self.transport.clone(), ns.collection.clone())
    }

    /// True while a push for `ns` is running.
    pub fn is_pushing(&self, ns: &Namespace) -> bool {
        self.push_locks.is_locked(ns)
    }

    /// Flush queued mutations of `ns` to the remote.
    ///
    /// A second push for the same namespace waits for the running one.
    /// Remote failures are reported in the result; only local storage
    /// failures are returned as `Err`.
    pub async fn push(&self, ns: &Namespace) -> Result<PushResult> {
        let _guard = self.push_locks.lock(ns).await;
        let pending = self.queue.pending(ns).await?;
        if pending.is_empty() {
            return Ok(PushResult::default());
        }

        tracing::info!(namespace = %ns, pending = pending.len(), "Starting push");
        let remote = self.remote(ns);
        let mut result = PushResult::default();
        let mut entries = pending.into_iter();

        while let Some(entry) = entries.next() {
            match self.push_entry(&remote, &entry).await {
                Ok(()) => result.pushed.push(entry),
                Err(error) if error.kind == ErrorKind::Storage => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        namespace = %ns,
                        entry_id = %entry.id,
                        entity_id = %entry.entity_id,
                        error = %error,
                        "Push stopped"
                    );
                    result.errors.push(PushFailure { entry, error });
                    result.unprocessed = entries.by_ref().collect();
                    break;
                }
            }
        }

        tracing::info!(
            namespace = %ns,
            pushed = result.pushed.len(),
            failed = result.errors.len(),
            unprocessed = result.unprocessed.len(),
            "Push finished"
        );
        Ok(result)
    }

    async fn push_entry(&self, remote: &RemoteCollection, entry: &SyncEntry) -> Result<()> {
        match entry.operation {
            SyncOperation::Delete => self.push_delete(remote, entry).await,
            SyncOperation::Upsert => self.push_upsert(remote, entry).await,
        }
    }

    async fn push_delete(&self, remote: &RemoteCollection, entry: &SyncEntry) -> Result<()> {
        match remote.delete(&entry.entity_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(entity_id = %entry.entity_id, "Already absent remotely");
            }
            Err(e) => return Err(e),
        }
        self.queue.ack(entry).await?;
        Ok(())
    }

    async fn push_upsert(&self, remote: &RemoteCollection, entry: &SyncEntry) -> Result<()> {
        let ns = &entry.namespace;
        let Some(local) = self.cache.try_get(ns, &entry.entity_id).await? else {
            // Cleared from the cache after it was queued; nothing left to send.
            tracing::debug!(entity_id = %entry.entity_id, "Queued entity no longer cached");
            self.queue.ack(entry).await?;
            return Ok(());
        };

        let saved = match remote.save(&local).await {
            Ok(saved) => saved,
            Err(e) if e.is_not_found() && !local.is_local() => {
                return Err(Error {
                    kind: ErrorKind::Conflict,
                    message: format!(
                        "entity '{}' no longer exists in collection '{}'",
                        entry.entity_id, ns.collection
                    ),
                    debug: e.debug,
                    status_code: e.status_code,
                });
            }
            Err(e) => return Err(e),
        };

        // Cache first: an interrupted push must leave the entry queued, never a
        // local copy without its entry.
        if self.queue.is_live(entry).await? {
            self.cache.replace(ns, &entry.entity_id, &saved).await?;
            if self.queue.ack(entry).await? {
                return Ok(());
            }
        }

        // A newer local mutation superseded this entry while it was in flight.
        // Keep the newer local version; a created entity still needs its server id.
        tracing::debug!(entity_id = %entry.entity_id, "Entry superseded during push");
        if local.is_local() {
            self.adopt_server_id(ns, &entry.entity_id, &saved).await?;
        }
        Ok(())
    }

    /// Move the newer local state of a just-created entity to its server id.
    async fn adopt_server_id(&self, ns: &Namespace, local_id: &str, saved: &Entity) -> Result<()> {
        let server_id = saved.require_id()?;
        if let Some(mut current) = self.cache.try_get(ns, local_id).await? {
            current.set_id(server_id);
            match saved.get(METADATA_FIELD) {
                Some(kmd) => current.insert(METADATA_FIELD, kmd.clone()),
                None => current.remove(METADATA_FIELD),
            };
            self.cache.replace(ns, local_id, &current).await?;
        }
        if let Some(live) = self.queue.entry_for(ns, local_id).await? {
            self.queue.discard(ns, &[local_id.to_string()]).await?;
            self.queue.enqueue(ns, server_id, live.operation).await?;
        }
        Ok(())
    }

    /// Fetch remote entities of `ns` and merge them into the cache.
    ///
    /// The sync queue is not consulted: an entity with a queued delete may
    /// reappear in the cache until that delete is pushed.
    pub async fn pull(&self, ns: &Namespace, query: Option<&Query>) -> Result<Vec<Entity>> {
        let entities = self.remote(ns).find(query).await?;

        for entity in &entities {
            let Some(id) = entity.id() else { continue };
            if let Some(cached) = self.cache.try_get(ns, id).await? {
                if cached.last_modified() > entity.last_modified() {
                    tracing::debug!(entity_id = id, "Cached copy is newer; server copy wins");
                }
            }
        }

        self.cache.upsert_many(ns, &entities).await?;
        tracing::info!(namespace = %ns, pulled = entities.len(), "Pull finished");
        Ok(entities)
    }

    /// Push, then pull if the push drained the queue.
    pub async fn sync(&self, ns: &Namespace, query: Option<&Query>) -> Result<SyncResult> {
        let push = self.push(ns).await?;
        if !push.is_complete() {
            tracing::info!(namespace = %ns, "Skipping pull after incomplete push");
            return Ok(SyncResult { push, pull: None });
        }
        let pulled = self.pull(ns, query).await?;
        Ok(SyncResult {
            push,
            pull: Some(pulled),
        })
    }
}
