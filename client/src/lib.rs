//! # Tether Client
//!
//! HTTP transport and configuration for the Tether data store.
//!
//! ```no_run
//! use tether_client::{Client, ClientConfig};
//! use tether_engine::{DataStoreType, StoreOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("kid_app", "app-secret").with_api_hostname("baas.example.com")?;
//! let client = Client::with_snapshot(config, "tether.json").await?;
//!
//! let books = client.collection("Books", DataStoreType::Sync, StoreOptions::default())?;
//! let result = books.sync(None).await?;
//! println!("pushed {}", result.push.pushed_count());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, DEFAULT_API_HOSTNAME, DEFAULT_TIMEOUT_MS};
pub use error::ClientError;
pub use http::HttpTransport;
