//! Remote-first store with a local cache.
//!
//! Reads refresh the cache from the remote and fall back to it when the
//! remote is unreachable. Writes go to the remote first; a write that fails
//! with a network error is kept in the cache and queued for the next push.
//! Entities with queued mutations are never overwritten by a refresh.

use crate::queue::{SyncEntry, SyncOperation};
use crate::remote::RemoteCollection;
use crate::store::{EntityStore, OfflineStore, StoreContext};
use crate::sync::{PushResult, SyncResult};
use crate::{Entity, EntityId, Namespace, Query, Result};
use async_trait::async_trait;
use std::collections::HashSet;

pub struct CacheStore {
    namespace: Namespace,
    ctx: StoreContext,
    remote: RemoteCollection,
}

impl CacheStore {
    pub(crate) fn new(namespace: Namespace, ctx: StoreContext) -> Self {
        let remote = RemoteCollection::new(ctx.transport.clone(), namespace.collection.clone());
        Self {
            namespace,
            ctx,
            remote,
        }
    }

    /// Overlay queued local mutations on a remote result.
    ///
    /// Remote entities with a queued mutation are replaced by their cached
    /// version, or dropped when deleted locally. Queued upserts the remote did
    /// not return are appended. The remote already applied `skip`, so only the
    /// filter, sort and limit run again over the merged set.
    async fn refresh(&self, remote: Vec<Entity>, query: Option<&Query>) -> Result<Vec<Entity>> {
        let pending = self.ctx.queue.pending(&self.namespace).await?;
        if pending.is_empty() {
            self.ctx.cache.upsert_many(&self.namespace, &remote).await?;
            return Ok(remote);
        }

        let pending_ids: HashSet<&str> = pending.iter().map(|e| e.entity_id.as_str()).collect();
        let clean: Vec<Entity> = remote
            .iter()
            .filter(|e| e.id().map_or(true, |id| !pending_ids.contains(id)))
            .cloned()
            .collect();
        self.ctx.cache.upsert_many(&self.namespace, &clean).await?;

        let mut returned: HashSet<EntityId> = HashSet::new();
        let mut merged = Vec::with_capacity(remote.len());
        for entity in remote {
            match entity.id().filter(|id| pending_ids.contains(*id)) {
                Some(id) => {
                    returned.insert(id.to_string());
                    if let Some(local) = self.ctx.cache.try_get(&self.namespace, id).await? {
                        merged.push(local);
                    }
                }
                None => merged.push(entity),
            }
        }

        for entry in &pending {
            if entry.operation != SyncOperation::Upsert || returned.contains(&entry.entity_id) {
                continue;
            }
            if let Some(local) = self.ctx.cache.try_get(&self.namespace, &entry.entity_id).await? {
                merged.push(local);
            }
        }

        Ok(match query {
            Some(query) => query.clone().skip(0).apply(merged),
            None => merged,
        })
    }
}

#[async_trait]
impl EntityStore for CacheStore {
    async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        match self.remote.find(query).await {
            Ok(entities) => self.refresh(entities, query).await,
            Err(e) if e.is_network() => {
                tracing::warn!(namespace = %self.namespace, error = %e, "Remote unreachable; reading from cache");
                self.ctx.cache.find(&self.namespace, query).await
            }
            Err(e) => Err(e),
        }
    }

    async fn count(&self, query: Option<&Query>) -> Result<usize> {
        // The remote cannot see queued mutations; count the merged view instead.
        if self.ctx.queue.count(&self.namespace).await? > 0 {
            let filter = query.map(Query::filter_only);
            return Ok(self.find(filter.as_ref()).await?.len());
        }

        match self.remote.count(query).await {
            Ok(count) => Ok(count),
            Err(e) if e.is_network() => {
                tracing::warn!(namespace = %self.namespace, error = %e, "Remote unreachable; counting cache");
                self.ctx.cache.count(&self.namespace, query).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: &str) -> Result<Entity> {
        // A queued mutation means the local copy is newer than the remote one.
        if self.ctx.queue.entry_for(&self.namespace, id).await?.is_some() {
            return self.ctx.cache.get(&self.namespace, id).await;
        }

        match self.remote.get(id).await {
            Ok(entity) => {
                self.ctx.cache.upsert(&self.namespace, &entity).await?;
                Ok(entity)
            }
            Err(e) if e.is_network() => {
                tracing::warn!(namespace = %self.namespace, entity_id = id, error = %e, "Remote unreachable; reading from cache");
                self.ctx.cache.get(&self.namespace, id).await
            }
            Err(e) if e.is_not_found() => {
                self.ctx.cache.remove(&self.namespace, id).await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity> {
        entity.ensure_id();
        let id = entity.require_id()?.to_string();

        match self.remote.save(&entity).await {
            Ok(saved) => {
                self.ctx.cache.replace(&self.namespace, &id, &saved).await?;
                // The remote now holds the latest state.
                self.ctx.queue.discard(&self.namespace, &[id]).await?;
                Ok(saved)
            }
            Err(e) if e.is_network() => {
                tracing::warn!(namespace = %self.namespace, entity_id = %id, error = %e, "Remote unreachable; queueing save");
                self.ctx.cache.upsert(&self.namespace, &entity).await?;
                self.ctx
                    .queue
                    .enqueue(&self.namespace, &id, SyncOperation::Upsert)
                    .await?;
                Ok(entity)
            }
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, id: &str) -> Result<usize> {
        let cached = self.ctx.cache.try_get(&self.namespace, id).await?;

        // Never pushed; the remote has nothing to delete.
        if cached.as_ref().is_some_and(Entity::is_local) {
            let removed = self.ctx.cache.remove(&self.namespace, id).await?;
            self.ctx
                .queue
                .discard(&self.namespace, &[id.to_string()])
                .await?;
            return Ok(removed);
        }

        match self.remote.delete(id).await {
            Ok(count) => {
                self.ctx.cache.remove(&self.namespace, id).await?;
                self.ctx
                    .queue
                    .discard(&self.namespace, &[id.to_string()])
                    .await?;
                Ok(count)
            }
            Err(e) if e.is_network() => {
                tracing::warn!(namespace = %self.namespace, entity_id = id, error = %e, "Remote unreachable; queueing delete");
                let removed = self.ctx.cache.remove(&self.namespace, id).await?;
                self.ctx
                    .queue
                    .enqueue(&self.namespace, id, SyncOperation::Delete)
                    .await?;
                Ok(removed)
            }
            Err(e) if e.is_not_found() => {
                self.ctx.cache.remove(&self.namespace, id).await?;
                self.ctx
                    .queue
                    .discard(&self.namespace, &[id.to_string()])
                    .await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl OfflineStore for CacheStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn pending_sync_entities(&self) -> Result<Vec<SyncEntry>> {
        self.ctx.queue.pending(&self.namespace).await
    }

    async fn pending_sync_count(&self) -> Result<usize> {
        self.ctx.queue.count(&self.namespace).await
    }

    async fn push(&self) -> Result<PushResult> {
        self.ctx.engine.push(&self.namespace).await
    }

    async fn pull(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        self.ctx.engine.pull(&self.namespace, query).await
    }

    async fn sync(&self, query: Option<&Query>) -> Result<SyncResult> {
        self.ctx.engine.sync(&self.namespace, query).await
    }

    async fn clear(&self, query: Option<&Query>) -> Result<usize> {
        self.ctx.clear_namespace(&self.namespace, query).await
    }
}
