//! Config loader error taxonomy.

use thiserror::Error;

/// Errors raised while discovering, loading, or saving gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform's config directory could not be determined.
    #[error("could not determine the platform config directory")]
    NoConfigDir,

    /// The config file could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file was not valid TOML for the expected schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization of a [`mcpgw_core::model::GatewayConfig`] failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The parsed config failed the core's own validation rules.
    #[error("invalid config: {0}")]
    Invalid(String),
}
