//! Error types for objfs
//!
//! Every failure is reported to the immediate caller. Nothing here is retried
//! internally; retry policy belongs to the layer that owns the file lock and
//! the object-store client.

use thiserror::Error;

/// Common result type for objfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for objfs
#[derive(Debug, Error)]
pub enum Error {
    /// Object capacity missing or unparsable. Fatal for index construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no object at offset {offset}")]
    NotFound { offset: u64 },

    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Sidecar document malformed or unreadable as JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O failure reading or writing a sidecar document.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error must abort construction rather than be handled
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
