//! Error types for the Tether engine.
//!
//! Every failure surfaced by the engine is an [`Error`]: a kind, a message,
//! optional debug detail from the server, and the HTTP status code when one
//! was available.

use std::fmt;
use thiserror::Error;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Local errors
    /// Invalid collection name, invalid or misapplied tag, unsupported store operation.
    Configuration,
    /// Entity is not a JSON object or lacks a usable id.
    InvalidEntity,
    /// The persistence backend failed.
    Storage,

    // Classified remote errors
    FeatureUnavailable,
    IncompleteRequestBody,
    InsufficientCredentials,
    InvalidCredentials,
    InvalidIdentifier,
    InvalidQuerySyntax,
    JsonParse,
    MissingQuery,
    MissingRequestHeader,
    MissingRequestParameter,
    NotFound,
    ParameterValueOutOfRange,
    ServerError,
    /// Unmatched non-success response.
    Remote,

    // Sync errors
    /// The transport could not complete the exchange. Retryable.
    Network,
    /// An upsert targeted an entity that no longer exists remotely.
    Conflict,
}

impl ErrorKind {
    /// Stable name of the kind, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "Configuration",
            ErrorKind::InvalidEntity => "InvalidEntity",
            ErrorKind::Storage => "Storage",
            ErrorKind::FeatureUnavailable => "FeatureUnavailable",
            ErrorKind::IncompleteRequestBody => "IncompleteRequestBody",
            ErrorKind::InsufficientCredentials => "InsufficientCredentials",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::InvalidQuerySyntax => "InvalidQuerySyntax",
            ErrorKind::JsonParse => "JSONParse",
            ErrorKind::MissingQuery => "MissingQuery",
            ErrorKind::MissingRequestHeader => "MissingRequestHeader",
            ErrorKind::MissingRequestParameter => "MissingRequestParameter",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ParameterValueOutOfRange => "ParameterValueOutOfRange",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::Remote => "Remote",
            ErrorKind::Network => "Network",
            ErrorKind::Conflict => "Conflict",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All possible errors from the Tether engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Error {
    /// What went wrong
    pub kind: ErrorKind,
    /// Human readable message (may be empty for remote errors without one)
    pub message: String,
    /// Server supplied debug detail
    pub debug: Option<String>,
    /// HTTP status code, when the error came from a response
    pub status_code: Option<u16>,
}

impl Error {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            debug: None,
            status_code: None,
        }
    }

    /// Create an error from a classified response.
    pub fn remote(
        kind: ErrorKind,
        message: impl Into<String>,
        debug: Option<String>,
        status_code: u16,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            debug,
            status_code: Some(status_code),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn invalid_entity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEntity, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// True for transport failures, which leave queued writes in place.
    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::storage(format!("serialization failed: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::storage(format!("io error: {err}"))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
