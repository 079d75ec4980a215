//! Errors raised while loading or validating Lectern configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// `config.toml`, a `LECTERN_` variable, or a `.env` entry failed to
    /// parse into [`crate::LecConfig`].
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Configuration section '{section}' is not configured (missing required fields)")]
    NotConfigured { section: String },

    /// Raised by `validate()`, e.g. a zero lookup concurrency.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
