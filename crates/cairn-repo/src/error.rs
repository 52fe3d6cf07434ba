use std::path::PathBuf;

use cairn_snapshot::SnapshotError;
use cairn_store::StoreError;
use cairn_verify::VerifyError;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("no cairn repository at {}", .0.display())]
    NotARepository(PathBuf),

    #[error("a cairn repository already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("unsupported repository format version {0}")]
    UnsupportedFormat(u32),

    /// `cairn.toml` could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// The path handed to snapshot creation cannot be captured.
    #[error("cannot snapshot {}: {reason}", path.display())]
    InvalidSnapshotSource { path: PathBuf, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("error walking directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
