//! Client handle.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpTransport;
use std::path::Path;
use std::sync::Arc;
use tether_engine::{
    DataStore, DataStoreType, MemoryBackend, PersistenceBackend, SnapshotBackend, Store,
    StoreOptions,
};

/// A configured connection to one application.
///
/// Owns the HTTP transport and the [`DataStore`] built on top of it.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    datastore: DataStore,
}

impl Client {
    /// Build a client over the given persistence backend.
    pub fn new(config: ClientConfig, backend: Arc<dyn PersistenceBackend>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let transport = HttpTransport::new(config.clone())?;

        tracing::info!(
            api_hostname = %config.api_hostname,
            app_key = %config.app_key,
            timeout_ms = config.default_timeout_ms,
            "Client initialized"
        );

        Ok(Self {
            datastore: DataStore::new(Arc::new(transport), backend),
            config,
        })
    }

    /// Build a client whose local state lives in memory only.
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    /// Build a client whose local state is persisted to a snapshot file.
    pub async fn with_snapshot(config: ClientConfig, path: impl AsRef<Path>) -> Result<Self> {
        let backend = SnapshotBackend::open(path).await?;
        Self::new(config, Arc::new(backend))
    }

    /// Build an in-memory client from `TETHER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::in_memory(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn datastore(&self) -> &DataStore {
        &self.datastore
    }

    /// Shorthand for [`DataStore::collection_with`].
    pub fn collection(
        &self,
        name: &str,
        store_type: DataStoreType,
        options: StoreOptions,
    ) -> Result<Store> {
        Ok(self.datastore.collection_with(name, store_type, options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::ClientError;

    #[test]
    fn rejects_invalid_config() {
        let mut config = ClientConfig::new("kid", "secret");
        config.app_secret = None;
        let err = Client::in_memory(config).err().unwrap();
        assert!(matches!(err, ClientError::Config(ConfigError::MissingSecret)));
    }

    #[tokio::test]
    async fn opens_stores() {
        let client = Client::in_memory(ClientConfig::new("kid", "secret")).unwrap();
        let store = client
            .collection("Books", DataStoreType::Sync, StoreOptions::default())
            .unwrap();
        assert_eq!(store.store_type(), DataStoreType::Sync);
        assert_eq!(store.pending_sync_count().await.unwrap(), 0);
    }
}
