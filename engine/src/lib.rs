//! # Tether Engine
//!
//! Offline-capable data store and sync engine for a backend-as-a-service
//! client.
//!
//! Applications keep reading and writing collections of JSON entities while
//! disconnected. Local mutations are recorded in a durable sync queue and
//! reconciled with the remote collection later.
//!
//! ## Design Principles
//!
//! - **Pluggable IO**: the remote is reached through a [`Transport`], local state
//!   lives in a [`PersistenceBackend`]
//! - **One entry per entity**: queued mutations coalesce by entity id
//! - **Ordered replay**: push stops at the first failure, so mutations never
//!   reach the remote out of order
//!
//! ## Core Concepts
//!
//! ### Stores
//!
//! A [`DataStore`] opens [`Store`] handles of three kinds:
//! - [`DataStoreType::Network`] - remote only
//! - [`DataStoreType::Cache`] - remote first, cache as fallback (default)
//! - [`DataStoreType::Sync`] - local first, explicit push/pull
//!
//! Offline-capable stores may carry a [`Tag`] that isolates their cache and
//! queue from other stores of the same collection.
//!
//! ### Responses
//!
//! Every remote reply is a [`Response`]. Non-success replies are classified
//! into an [`ErrorKind`] by [`classify`].
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//! use tether_engine::{
//!     DataStore, DataStoreType, Entity, Error, MemoryBackend, Request, Response, StoreOptions,
//!     Transport,
//! };
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl Transport for Offline {
//!     async fn send(&self, _request: Request) -> tether_engine::Result<Response> {
//!         Err(Error::network("offline"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> tether_engine::Result<()> {
//! let datastore = DataStore::new(Arc::new(Offline), Arc::new(MemoryBackend::new()));
//! let books = datastore.collection_with("Books", DataStoreType::Sync, StoreOptions::default())?;
//!
//! let saved = books.save(Entity::from_value(json!({"title": "Dune"}))?).await?;
//! assert!(saved.is_local());
//! assert_eq!(books.pending_sync_count().await?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! [`MemoryBackend`] keeps everything in memory. [`SnapshotBackend`] writes a
//! JSON [`Snapshot`] to disk after every mutation.

pub mod backend;
pub mod cache;
pub mod cache_store;
pub mod entity;
pub mod error;
pub mod locks;
pub mod namespace;
pub mod network_store;
pub mod query;
pub mod queue;
pub mod remote;
pub mod response;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod sync_store;
pub mod transport;

// Re-export main types at crate root
pub use backend::{MemoryBackend, PersistenceBackend, Table};
pub use cache::CacheRepository;
pub use cache_store::CacheStore;
pub use entity::{Entity, Metadata, ACL_FIELD, ID_FIELD, METADATA_FIELD};
pub use error::{Error, ErrorKind, Result};
pub use namespace::{Namespace, Tag};
pub use network_store::NetworkStore;
pub use query::{Query, SortDirection};
pub use queue::{EntryId, SyncEntry, SyncOperation, SyncQueue};
pub use remote::RemoteCollection;
pub use response::{classify, Headers, Response, StatusCode};
pub use snapshot::{Snapshot, SnapshotBackend, SNAPSHOT_FORMAT_VERSION};
pub use store::{DataStore, DataStoreType, EntityStore, OfflineStore, Store, StoreOptions};
pub use sync::{PushFailure, PushResult, SyncEngine, SyncResult};
pub use sync_store::SyncStore;
pub use transport::{Method, Request, Transport};

/// Type aliases for clarity
pub type EntityId = String;
pub type CollectionName = String;
/// Milliseconds since the Unix epoch
pub type Timestamp = u64;
