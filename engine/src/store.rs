//! Store façade.
//!
//! [`DataStore`] is the entry point. It owns the shared cache, queue and sync
//! engine, and hands out [`Store`] handles for a collection. A handle is one of
//! three variants, fixed when it is opened:
//!
//! - [`NetworkStore`]: remote only.
//! - [`CacheStore`]: remote is the source of truth, the cache accelerates reads
//!   and catches writes made while offline.
//! - [`SyncStore`]: the cache is the source of truth, writes are queued and
//!   reach the remote only through an explicit push or sync.
//!
//! Handles opened for the same collection and tag share the same cache and
//! queue state.

use crate::backend::PersistenceBackend;
use crate::cache::CacheRepository;
use crate::cache_store::CacheStore;
use crate::network_store::NetworkStore;
use crate::queue::{SyncEntry, SyncQueue};
use crate::sync::{PushResult, SyncEngine, SyncResult};
use crate::sync_store::SyncStore;
use crate::transport::Transport;
use crate::{Entity, Error, Namespace, Query, Result, Tag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Which store variant to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataStoreType {
    Network,
    #[default]
    Cache,
    Sync,
}

impl fmt::Display for DataStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataStoreType::Network => f.write_str("Network"),
            DataStoreType::Cache => f.write_str("Cache"),
            DataStoreType::Sync => f.write_str("Sync"),
        }
    }
}

/// Options for opening a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreOptions {
    /// Isolates the local cache and queue; offline-capable stores only
    #[serde(default)]
    pub tag: Option<String>,
}

impl StoreOptions {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
        }
    }

    /// Parse options from JSON; a malformed document is a configuration error.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::config(format!("invalid store options: {e}")))
    }
}

/// Reads and writes supported by every store variant.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Entities matching `query` (all entities when `None`).
    async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>>;

    /// Number of entities matching `query`.
    async fn count(&self, query: Option<&Query>) -> Result<usize>;

    /// One entity by id.
    async fn get(&self, id: &str) -> Result<Entity>;

    /// Create or update an entity. An entity without `_id` gets one.
    async fn save(&self, entity: Entity) -> Result<Entity>;

    /// Remove one entity by id. Returns the number removed.
    async fn remove(&self, id: &str) -> Result<usize>;
}

/// Sync capability of offline-capable stores.
#[async_trait]
pub trait OfflineStore: EntityStore {
    fn namespace(&self) -> &Namespace;

    /// Current sync queue contents, oldest first.
    async fn pending_sync_entities(&self) -> Result<Vec<SyncEntry>>;

    async fn pending_sync_count(&self) -> Result<usize>;

    async fn push(&self) -> Result<PushResult>;

    async fn pull(&self, query: Option<&Query>) -> Result<Vec<Entity>>;

    async fn sync(&self, query: Option<&Query>) -> Result<SyncResult>;

    /// Remove matching entities from the local cache and drop their queued
    /// mutations. Never touches the remote. Returns the number removed.
    async fn clear(&self, query: Option<&Query>) -> Result<usize>;
}

/// State shared by every handle of one [`DataStore`].
#[derive(Clone)]
pub(crate) struct StoreContext {
    pub(crate) cache: CacheRepository,
    pub(crate) queue: SyncQueue,
    pub(crate) engine: SyncEngine,
    pub(crate) transport: Arc<dyn Transport>,
}

impl StoreContext {
    pub(crate) async fn clear_namespace(
        &self,
        ns: &Namespace,
        query: Option<&Query>,
    ) -> Result<usize> {
        match query {
            Some(query) => {
                let ids = self.cache.remove_matching(ns, query).await?;
                self.queue.discard(ns, &ids).await?;
                Ok(ids.len())
            }
            None => {
                let count = self.cache.count(ns, None).await?;
                self.cache.clear(ns).await?;
                self.queue.clear(ns).await?;
                Ok(count)
            }
        }
    }
}

/// Factory for store handles.
#[derive(Clone)]
pub struct DataStore {
    ctx: StoreContext,
}

impl DataStore {
    /// Wire a transport and a persistence backend together.
    pub fn new(transport: Arc<dyn Transport>, backend: Arc<dyn PersistenceBackend>) -> Self {
        let cache = CacheRepository::new(backend.clone());
        let queue = SyncQueue::new(backend);
        let engine = SyncEngine::new(cache.clone(), queue.clone(), transport.clone());
        Self {
            ctx: StoreContext {
                cache,
                queue,
                engine,
                transport,
            },
        }
    }

    /// Open a [`CacheStore`] for `name`.
    pub fn collection(&self, name: &str) -> Result<Store> {
        self.collection_with(name, DataStoreType::default(), StoreOptions::default())
    }

    /// Open a store of the given type.
    ///
    /// Fails with a configuration error if the name is empty, the tag is
    /// invalid, or a tag is given for a network store.
    pub fn collection_with(
        &self,
        name: &str,
        store_type: DataStoreType,
        options: StoreOptions,
    ) -> Result<Store> {
        let tag = options.tag.as_deref().map(Tag::parse).transpose()?;

        let store = match (store_type, tag) {
            (DataStoreType::Network, Some(_)) => {
                return Err(Error::config(
                    "a tag can only be used with Cache or Sync stores",
                ));
            }
            (DataStoreType::Network, None) => {
                let ns = Namespace::new(name)?;
                Store::Network(NetworkStore::new(ns, self.ctx.transport.clone()))
            }
            (DataStoreType::Cache, tag) => {
                Store::Cache(CacheStore::new(namespace(name, tag)?, self.ctx.clone()))
            }
            (DataStoreType::Sync, tag) => {
                Store::Sync(SyncStore::new(namespace(name, tag)?, self.ctx.clone()))
            }
        };

        tracing::debug!(namespace = %store.namespace(), store_type = %store_type, "Opened store");
        Ok(store)
    }

    /// Alias of [`DataStore::collection_with`].
    pub fn get_instance(
        &self,
        name: &str,
        store_type: DataStoreType,
        options: StoreOptions,
    ) -> Result<Store> {
        self.collection_with(name, store_type, options)
    }

    /// Drop every cached entity and every queued mutation, for all namespaces.
    pub async fn clear_cache(&self) -> Result<()> {
        self.ctx.cache.clear_all().await?;
        self.ctx.queue.clear_all().await?;
        tracing::info!("Cleared local cache and sync queue");
        Ok(())
    }

    /// The sync engine shared by all handles.
    pub fn sync_engine(&self) -> &SyncEngine {
        &self.ctx.engine
    }
}

fn namespace(name: &str, tag: Option<Tag>) -> Result<Namespace> {
    match tag {
        Some(tag) => Namespace::tagged(name, tag),
        None => Namespace::new(name),
    }
}

/// A store handle: one of the three variants.
pub enum Store {
    Network(NetworkStore),
    Cache(CacheStore),
    Sync(SyncStore),
}

impl Store {
    pub fn store_type(&self) -> DataStoreType {
        match self {
            Store::Network(_) => DataStoreType::Network,
            Store::Cache(_) => DataStoreType::Cache,
            Store::Sync(_) => DataStoreType::Sync,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        match self {
            Store::Network(s) => s.namespace(),
            Store::Cache(s) => OfflineStore::namespace(s),
            Store::Sync(s) => OfflineStore::namespace(s),
        }
    }

    fn entities(&self) -> &dyn EntityStore {
        match self {
            Store::Network(s) => s,
            Store::Cache(s) => s,
            Store::Sync(s) => s,
        }
    }

    /// The sync capability, or a configuration error for network stores.
    pub fn offline(&self) -> Result<&dyn OfflineStore> {
        match self {
            Store::Network(_) => Err(Error::config(
                "sync operations require a Cache or Sync store",
            )),
            Store::Cache(s) => Ok(s),
            Store::Sync(s) => Ok(s),
        }
    }

    pub async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        self.entities().find(query).await
    }

    pub async fn count(&self, query: Option<&Query>) -> Result<usize> {
        self.entities().count(query).await
    }

    pub async fn get(&self, id: &str) -> Result<Entity> {
        self.entities().get(id).await
    }

    pub async fn save(&self, entity: Entity) -> Result<Entity> {
        self.entities().save(entity).await
    }

    pub async fn remove(&self, id: &str) -> Result<usize> {
        self.entities().remove(id).await
    }

    pub async fn pending_sync_entities(&self) -> Result<Vec<SyncEntry>> {
        self.offline()?.pending_sync_entities().await
    }

    pub async fn pending_sync_count(&self) -> Result<usize> {
        self.offline()?.pending_sync_count().await
    }

    pub async fn push(&self) -> Result<PushResult> {
        self.offline()?.push().await
    }

    pub async fn pull(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        self.offline()?.pull(query).await
    }

    pub async fn sync(&self, query: Option<&Query>) -> Result<SyncResult> {
        self.offline()?.sync(query).await
    }

    pub async fn clear(&self, query: Option<&Query>) -> Result<usize> {
        self.offline()?.clear(query).await
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("type", &self.store_type())
            .field("namespace", self.namespace())
            .finish()
    }
}
