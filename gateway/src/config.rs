use aggregator::AggregatorConfig;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("session.cookie_name cannot be empty")]
    EmptyCookieName,

    #[error("session.ttl_secs must be at least 1")]
    ZeroSessionTtl,

    #[error(transparent)]
    Aggregator(#[from] aggregator::config::ValidationError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for incoming requests
    pub listener: Listener,
    /// The reservation service this gateway fronts
    pub upstream: UpstreamConfig,
    /// Aggregation engine tuning
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Session store behavior
    #[serde(default)]
    pub session: SessionConfig,
    /// Optional statsd metrics sink
    #[serde(default)]
    pub statsd: Option<StatsdConfig>,
}

impl Config {
    /// Loads and validates a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.aggregator.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream reservation service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL of the reservation service
    ///
    /// Note: Uses the `url::Url` type so invalid URLs are rejected during
    /// config deserialization.
    pub base_url: Url,
    /// When set, only facilities whose country attribute equals this value
    /// are aggregated
    #[serde(default)]
    pub country_filter: Option<String>,
}

/// Session store configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a stored session stays valid after login
    pub ttl_secs: u64,
    /// Name of the session cookie issued to gateway clients
    pub cookie_name: String,
    /// Credentials for the anonymous fallback login, when offered
    pub anonymous: Option<Credentials>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            cookie_name: "refuge_session".to_string(),
            anonymous: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ttl_secs == 0 {
            return Err(ValidationError::ZeroSessionTtl);
        }
        if self.cookie_name.is_empty() {
            return Err(ValidationError::EmptyCookieName);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Statsd exporter configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    /// Prefix prepended to every metric name
    #[serde(default = "default_statsd_prefix")]
    pub prefix: String,
}

fn default_statsd_prefix() -> String {
    "refuge".to_string()
}
