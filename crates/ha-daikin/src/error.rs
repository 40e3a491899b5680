//! Error types for the Daikin integration

use daikin_api::DaikinError;
use thiserror::Error;

/// Result type for entry setup and unload
pub type SetupResult<T> = Result<T, SetupError>;

/// Errors raised while setting up or unloading a config entry
#[derive(Debug, Error)]
pub enum SetupError {
    /// The unit could not be reached; the host should retry later
    #[error("config entry not ready: {0}")]
    NotReady(#[source] DaikinError),

    /// The entry data is missing something setup needs
    #[error("invalid config entry data: {0}")]
    InvalidData(#[from] ConfigError),

    /// Setup was asked for an entry whose client is not stored
    #[error("no Daikin client stored for entry {0}")]
    MissingClient(String),

    /// A platform failed to set up
    #[error("platform {platform} failed: {reason}")]
    Platform {
        platform: &'static str,
        reason: String,
    },
}

/// Result type for configuration parsing
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while reading integration configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is absent
    #[error("missing required key '{key}'")]
    MissingKey { key: &'static str },

    /// A key holds a value of the wrong shape
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// The YAML block for the domain could not be parsed
    #[error("failed to parse {domain} configuration: {source}")]
    ParseYaml {
        domain: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}
