//! Remote-only store.

use crate::remote::RemoteCollection;
use crate::store::EntityStore;
use crate::transport::Transport;
use crate::{Entity, Namespace, Query, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads and writes go straight to the remote; nothing is cached or queued.
pub struct NetworkStore {
    namespace: Namespace,
    remote: RemoteCollection,
}

impl NetworkStore {
    pub(crate) fn new(namespace: Namespace, transport: Arc<dyn Transport>) -> Self {
        let remote = RemoteCollection::new(transport, namespace.collection.clone());
        Self { namespace, remote }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

#[async_trait]
impl EntityStore for NetworkStore {
    async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        self.remote.find(query).await
    }

    async fn count(&self, query: Option<&Query>) -> Result<usize> {
        self.remote.count(query).await
    }

    async fn get(&self, id: &str) -> Result<Entity> {
        self.remote.get(id).await
    }

    async fn save(&self, entity: Entity) -> Result<Entity> {
        // The server assigns ids to new entities.
        if entity.id().is_none() {
            return self.remote.create(&entity).await;
        }
        self.remote.save(&entity).await
    }

    async fn remove(&self, id: &str) -> Result<usize> {
        self.remote.delete(id).await
    }
}
