use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    Load(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Expected exactly two backends, found {0}")]
    WrongBackendCount(usize),

    #[error("Empty backend name")]
    EmptyBackendName,

    #[error("Duplicate backend name: {0}")]
    DuplicateBackend(String),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// The two replicated backends. The first entry is the primary: its
    /// body wins ties when both backends succeed, and its error wins ties
    /// when both backends reject an operation.
    pub backends: Vec<BackendConfig>,
    /// Transport-level HTTP client settings for upstream calls
    #[serde(default)]
    pub upstream: UpstreamConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        // The fan-out is defined over a backend pair, nothing else
        if self.backends.len() != 2 {
            return Err(ValidationError::WrongBackendCount(self.backends.len()));
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            if backend.name.is_empty() {
                return Err(ValidationError::EmptyBackendName);
            }
            if !names.insert(&backend.name) {
                return Err(ValidationError::DuplicateBackend(backend.name.clone()));
            }
        }

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

/// One replicated user-management backend
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Identifier used in logs and failure messages (e.g. "DXB", "SG")
    pub name: String,
    /// Base URL of the backend
    ///
    /// Note: Uses the `url::Url` type so invalid URLs are rejected during
    /// config deserialization.
    pub url: Url,
}

/// Transport-level settings for the upstream HTTP client. The gateway
/// itself imposes no deadline beyond these; both fan-out calls are always
/// awaited to completion.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Timeout for a complete request/response exchange, in seconds
    pub http_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}
