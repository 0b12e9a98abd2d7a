//! Client configuration.

use std::env;
use std::time::Duration;
use url::Url;

/// Hostname used when none is configured.
pub const DEFAULT_API_HOSTNAME: &str = "https://baas.kinvey.com";

/// Request timeout used when none (or a negative one) is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Connection settings for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the remote, without a trailing slash
    pub api_hostname: String,
    pub app_key: String,
    pub app_secret: Option<String>,
    pub master_secret: Option<String>,
    /// Sent as `X-Kinvey-Api-Version`
    pub app_version: Option<String>,
    /// Session token; replaces app-credential auth when set
    pub auth_token: Option<String>,
    pub default_timeout_ms: u64,
}

impl ClientConfig {
    /// Configuration with an app secret and defaults for everything else.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            api_hostname: DEFAULT_API_HOSTNAME.to_string(),
            app_key: app_key.into(),
            app_secret: Some(app_secret.into()),
            master_secret: None,
            app_version: None,
            auth_token: None,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_api_hostname(mut self, hostname: &str) -> Result<Self, ConfigError> {
        self.api_hostname = normalize_hostname(hostname)?;
        Ok(self)
    }

    pub fn with_master_secret(mut self, secret: impl Into<String>) -> Self {
        self.master_secret = Some(secret.into());
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Load configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_hostname = match var("TETHER_API_HOSTNAME") {
            Some(raw) => normalize_hostname(&raw)?,
            None => DEFAULT_API_HOSTNAME.to_string(),
        };

        let default_timeout_ms = match var("TETHER_DEFAULT_TIMEOUT") {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let config = Self {
            api_hostname,
            app_key: var("TETHER_APP_KEY").ok_or(ConfigError::MissingAppKey)?,
            app_secret: var("TETHER_APP_SECRET"),
            master_secret: var("TETHER_MASTER_SECRET"),
            app_version: var("TETHER_APP_VERSION"),
            auth_token: var("TETHER_AUTH_TOKEN"),
            default_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants that builders cannot enforce on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_key.trim().is_empty() {
            return Err(ConfigError::MissingAppKey);
        }
        if self.app_secret.is_none() && self.master_secret.is_none() {
            return Err(ConfigError::MissingSecret);
        }
        Url::parse(&self.api_hostname)
            .map_err(|_| ConfigError::InvalidHostname(self.api_hostname.clone()))?;
        Ok(())
    }

    /// Root of the collection API for this app.
    pub fn appdata_url(&self) -> String {
        format!("{}/appdata/{}", self.api_hostname, self.app_key)
    }
}

/// Prepend `https://` when no scheme is present and drop trailing slashes.
fn normalize_hostname(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let normalized = with_scheme.trim_end_matches('/').to_string();

    match Url::parse(&normalized) {
        Ok(url) if url.host_str().is_some() => Ok(normalized),
        _ => Err(ConfigError::InvalidHostname(raw.to_string())),
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimeout(raw.to_string()))?;
    if value < 0 {
        tracing::info!(
            configured = value,
            default = DEFAULT_TIMEOUT_MS,
            "Negative timeout; using the default"
        );
        return Ok(DEFAULT_TIMEOUT_MS);
    }
    Ok(value.unsigned_abs())
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TETHER_APP_KEY is required")]
    MissingAppKey,

    #[error("an app secret or a master secret is required")]
    MissingSecret,

    #[error("Invalid API hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid timeout value: {0}")]
    InvalidTimeout(String),
}
