//! Error types for configuration and the memory store.

use thiserror::Error;

/// Fatal configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is absent.
    #[error("missing required credential `{field}` (set it in config.json or export {env})")]
    MissingCredential {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of the persistent memory store. Always propagated to the caller.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not encode context content: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored timestamp '{0}' is malformed")]
    Timestamp(String),

    #[error("window of {0} days is out of range")]
    InvalidWindow(i64),

    #[error("memory store lock poisoned")]
    Poisoned,
}
