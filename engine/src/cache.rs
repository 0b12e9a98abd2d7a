//! Local cache repository.
//!
//! Durable per-namespace entity storage on top of a [`PersistenceBackend`].
//! Mutations of one namespace are serialized by a namespace lock; reads go
//! straight to the backend.

use crate::backend::PersistenceBackend;
use crate::locks::NamespaceLocks;
use crate::{Entity, EntityId, Error, Namespace, Query, Result};
use std::sync::Arc;

/// Table prefix for cached entities.
pub const CACHE_PREFIX: &str = "cache";

/// Keyed entity storage per namespace.
#[derive(Clone)]
pub struct CacheRepository {
    backend: Arc<dyn PersistenceBackend>,
    locks: Arc<NamespaceLocks>,
}

impl CacheRepository {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(NamespaceLocks::new()),
        }
    }

    /// Get an entity by id.
    pub async fn get(&self, ns: &Namespace, id: &str) -> Result<Entity> {
        self.try_get(ns, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("entity '{id}' not found in {ns} cache")))
    }

    /// Get an entity by id, `None` if absent.
    pub async fn try_get(&self, ns: &Namespace, id: &str) -> Result<Option<Entity>> {
        self.backend
            .get(&ns.table(CACHE_PREFIX), id)
            .await?
            .map(Entity::from_value)
            .transpose()
    }

    /// All entities matching `query`, in insertion order unless it sorts.
    pub async fn find(&self, ns: &Namespace, query: Option<&Query>) -> Result<Vec<Entity>> {
        let entities = self
            .backend
            .scan(&ns.table(CACHE_PREFIX))
            .await?
            .into_iter()
            .map(|(_, value)| Entity::from_value(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(match query {
            Some(query) => query.apply(entities),
            None => entities,
        })
    }

    /// Number of entities matching `query`, ignoring its skip/limit.
    pub async fn count(&self, ns: &Namespace, query: Option<&Query>) -> Result<usize> {
        let entities = self.find(ns, None).await?;
        Ok(match query {
            Some(query) => entities.iter().filter(|e| query.matches(e)).count(),
            None => entities.len(),
        })
    }

    /// Insert or overwrite an entity by id.
    pub async fn upsert(&self, ns: &Namespace, entity: &Entity) -> Result<()> {
        let id = entity.require_id()?;
        let _guard = self.locks.lock(ns).await;
        self.backend
            .put(&ns.table(CACHE_PREFIX), id, entity.clone().into_value())
            .await
    }

    /// Insert or overwrite several entities under one lock.
    pub async fn upsert_many(&self, ns: &Namespace, entities: &[Entity]) -> Result<()> {
        // Validate everything before writing anything.
        for entity in entities {
            entity.require_id()?;
        }
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(CACHE_PREFIX);
        for entity in entities {
            self.backend
                .put(&table, entity.require_id()?, entity.clone().into_value())
                .await?;
        }
        Ok(())
    }

    /// Replace the entity stored under `old_id` with `entity`.
    ///
    /// Used when a locally created entity receives its server id.
    pub async fn replace(&self, ns: &Namespace, old_id: &str, entity: &Entity) -> Result<()> {
        let id = entity.require_id()?;
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(CACHE_PREFIX);
        if old_id != id {
            self.backend.delete(&table, old_id).await?;
        }
        self.backend.put(&table, id, entity.clone().into_value()).await
    }

    /// Remove one entity. Returns the number removed (0 or 1).
    pub async fn remove(&self, ns: &Namespace, id: &str) -> Result<usize> {
        let _guard = self.locks.lock(ns).await;
        let removed = self.backend.delete(&ns.table(CACHE_PREFIX), id).await?;
        Ok(usize::from(removed))
    }

    /// Remove every entity matching `query`. Returns the removed ids.
    pub async fn remove_matching(&self, ns: &Namespace, query: &Query) -> Result<Vec<EntityId>> {
        let _guard = self.locks.lock(ns).await;
        let table = ns.table(CACHE_PREFIX);
        let mut removed = Vec::new();
        for (id, value) in self.backend.scan(&table).await? {
            let entity = Entity::from_value(value)?;
            if query.matches(&entity) && self.backend.delete(&table, &id).await? {
                removed.push(id);
            }
        }
        Ok(removed)
    }

    /// Drop every entity of one namespace.
    pub async fn clear(&self, ns: &Namespace) -> Result<()> {
        let _guard = self.locks.lock(ns).await;
        self.backend.drop_table(&ns.table(CACHE_PREFIX)).await
    }

    /// Drop every entity of every namespace.
    pub async fn clear_all(&self) -> Result<()> {
        for ns in self.namespaces().await? {
            self.clear(&ns).await?;
        }
        Ok(())
    }

    /// Namespaces that currently hold cached entities.
    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(self
            .backend
            .tables()
            .await?
            .iter()
            .filter_map(|table| Namespace::from_table(CACHE_PREFIX, table))
            .collect())
    }
}
