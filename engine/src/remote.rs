//! Remote collection access.
//!
//! Maps collection reads and writes onto transport requests and classifies
//! every response.

use crate::transport::{Method, Request, Transport};
use crate::{CollectionName, Entity, Error, Query, Result};
use serde_json::Value;
use std::sync::Arc;

/// CRUD against one remote collection.
#[derive(Clone)]
pub struct RemoteCollection {
    transport: Arc<dyn Transport>,
    collection: CollectionName,
}

impl RemoteCollection {
    pub fn new(transport: Arc<dyn Transport>, collection: impl Into<CollectionName>) -> Self {
        Self {
            transport,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.collection)
    }

    /// The id is percent-encoded so it always addresses a single segment.
    fn entity_path(&self, id: &str) -> Result<String> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(Error::invalid_entity(format!(
                "'{id}' cannot be used as an entity id"
            )));
        }
        Ok(format!("/{}/{}", self.collection, urlencoding::encode(id)))
    }

    async fn send(&self, request: Request) -> Result<Option<Value>> {
        tracing::trace!(method = %request.method, path = %request.path, "Remote request");
        self.transport.send(request).await?.into_result()
    }

    /// Entities matching `query`.
    pub async fn find(&self, query: Option<&Query>) -> Result<Vec<Entity>> {
        let mut request = Request::new(Method::Get, self.collection_path());
        if let Some(query) = query {
            request = request.with_query(query.to_query_string()?);
        }
        match self.send(request).await? {
            Some(Value::Array(items)) => items.into_iter().map(Entity::from_value).collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(Error::new(
                crate::ErrorKind::JsonParse,
                format!("expected an array of entities, got {other}"),
            )),
        }
    }

    /// Number of entities matching `query`.
    pub async fn count(&self, query: Option<&Query>) -> Result<usize> {
        let mut request = Request::new(Method::Get, format!("{}/_count", self.collection_path()));
        if let Some(query) = query {
            request = request.with_query(query.to_query_string()?);
        }
        let data = self.send(request).await?;
        data.as_ref()
            .and_then(|d| d.get("count"))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::new(crate::ErrorKind::JsonParse, "count response lacks a count")
            })
    }

    pub async fn get(&self, id: &str) -> Result<Entity> {
        let data = self
            .send(Request::new(Method::Get, self.entity_path(id)?))
            .await?;
        expect_entity(data)
    }

    /// Create an entity; the server assigns the id of a locally created one.
    pub async fn create(&self, entity: &Entity) -> Result<Entity> {
        let request =
            Request::new(Method::Post, self.collection_path()).with_body(entity.to_create_body());
        expect_entity(self.send(request).await?)
    }

    /// Replace an existing entity by id.
    pub async fn update(&self, entity: &Entity) -> Result<Entity> {
        let id = entity.require_id()?;
        let request =
            Request::new(Method::Put, self.entity_path(id)?).with_body(entity.clone().into_value());
        expect_entity(self.send(request).await?)
    }

    /// Create a locally created entity, update any other.
    pub async fn save(&self, entity: &Entity) -> Result<Entity> {
        if entity.is_local() {
            self.create(entity).await
        } else {
            self.update(entity).await
        }
    }

    /// Delete by id. Returns the server-reported count (1 when absent from the body).
    pub async fn delete(&self, id: &str) -> Result<usize> {
        let data = self
            .send(Request::new(Method::Delete, self.entity_path(id)?))
            .await?;
        Ok(data
            .as_ref()
            .and_then(|d| d.get("count"))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(1))
    }
}

fn expect_entity(data: Option<Value>) -> Result<Entity> {
    match data {
        Some(value) => Entity::from_value(value),
        None => Err(Error::new(
            crate::ErrorKind::JsonParse,
            "expected an entity in the response body",
        )),
    }
}
