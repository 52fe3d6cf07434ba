use cairn_snapshot::SnapshotError;
use cairn_types::TypeError;

use crate::budget::Failure;

/// Errors that end a verification run.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The run configuration is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source selection could not be parsed.
    #[error("error parsing {input:?}: {reason}")]
    InvalidSource { input: String, reason: String },

    /// An explicitly supplied object id could not be parsed.
    #[error("invalid object id {input:?}: {source}")]
    InvalidObjectId {
        input: String,
        #[source]
        source: TypeError,
    },

    /// Manifests could not be listed or loaded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The walk finished and recorded failures.
    #[error("encountered {count} errors")]
    Failed { count: usize, failures: Vec<Failure> },
}

impl VerifyError {
    /// Individual failures behind a [`VerifyError::Failed`]; empty otherwise.
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::Failed { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result alias for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
