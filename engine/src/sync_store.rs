//! Local-first store.
//!
//! Reads are served from the cache only. Writes land in the cache and the sync
//! queue; the remote sees them on the next push or sync.

use crate::queue::{SyncEntry, SyncOperation};
use crate::store::{EntityStore, OfflineStore, StoreContext};
use crate::sync::{PushResult, SyncResult};
use crate::{Entity, Error, Namespace, Query, Result};
use async_trait::async_trait;

pub struct SyncStore {
    namespace: Namespace,
    ctx: StoreContext,
}

impl SyncStore {
    pub(crate) fn new(namespace: Namespace, ctx: StoreContext) -> Self {
        Self { namespace, ctx }
    }
}

#[async_trait]
impl EntityStore for SyncStore {
    async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        self.ctx.cache.find(&self.namespace, query).await
    }

    async fn count(&self, query: Option<&Query>) -> Result<usize> {
        self.ctx.cache.count(&self.namespace, query).await
    }

    async fn get(&self, id: &str) -> Result<Entity> {
        self.ctx.cache.get(&self.namespace, id).await
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity> {
        entity.ensure_id();
        let id = entity.require_id()?.to_string();
        self.ctx.cache.upsert(&self.namespace, &entity).await?;
        self.ctx
            .queue
            .enqueue(&self.namespace, &id, SyncOperation::Upsert)
            .await?;
        Ok(entity)
    }

    async fn remove(&self, id: &str) -> Result<usize> {
        let Some(cached) = self.ctx.cache.try_get(&self.namespace, id).await? else {
            return Err(Error::not_found(format!(
                "entity '{id}' not found in {} cache",
                self.namespace
            )));
        };
        self.ctx.cache.remove(&self.namespace, id).await?;

        // Never pushed; dropping its queued create is enough.
        if cached.is_local() {
            self.ctx
                .queue
                .discard(&self.namespace, &[id.to_string()])
                .await?;
        } else {
            self.ctx
                .queue
                .enqueue(&self.namespace, id, SyncOperation::Delete)
                .await?;
        }
        Ok(1)
    }
}

#[async_trait]
impl OfflineStore for SyncStore {
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
