//! Error types for snapshot manifest operations.

use thiserror::Error;

use crate::manifest::ManifestId;

/// Errors that can occur during manifest operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The manifest was not found.
    #[error("snapshot manifest not found: {0}")]
    NotFound(ManifestId),

    /// A source specification could not be parsed.
    #[error("invalid source {input:?}: {reason}")]
    InvalidSource { input: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A store lock was poisoned by a panicking thread.
    #[error("snapshot store lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error during file-based manifest operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for manifest operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;
