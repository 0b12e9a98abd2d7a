//! Unified error handling for the client.

use crate::config::ConfigError;

/// Errors raised while building or using a [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Data store error: {0}")]
    Engine(#[from] tether_engine::Error),
}

/// Result type alias for client setup.
pub type Result<T> = std::result::Result<T, ClientError>;
