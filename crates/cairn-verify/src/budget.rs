//! Failure accounting and the soft error threshold.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cairn_types::ObjectId;
use serde::Serialize;
use tracing::warn;

/// What went wrong with one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    /// The directory's entries could not be listed.
    #[error("error listing directory: {0}")]
    Listing(String),

    /// Shallow verification of the object failed.
    #[error("error verifying object: {0}")]
    Verification(String),

    /// The stored length differs from the length recorded by the parent.
    #[error("invalid object length {actual}, expected {expected}")]
    LengthMismatch { actual: u64, expected: u64 },

    /// A sampled full-content read failed.
    #[error("error reading object: {0}")]
    DeepRead(String),
}

/// One recorded failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Human-readable location of the object (not used for dedup).
    pub path: String,
    pub object_id: ObjectId,
    pub kind: FailureKind,
}

impl Failure {
    pub fn new(path: impl Into<String>, object_id: ObjectId, kind: FailureKind) -> Self {
        Self {
            path: path.into(),
            object_id,
            kind,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed on {} ({}): {}", self.path, self.object_id, self.kind)
    }
}

/// Accumulates failures for a run and answers whether the threshold has
/// been reached.
///
/// The bound is soft: workers already running keep recording failures after
/// the threshold is crossed, they only stop expanding new children.
#[derive(Debug)]
pub struct ErrorBudget {
    max_errors: usize,
    failures: Mutex<Vec<Failure>>,
}

impl ErrorBudget {
    /// `max_errors == 0` means the threshold is never reached.
    pub fn new(max_errors: usize) -> Self {
        Self {
            max_errors,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Record a failure, logging it immediately. Returns whether the
    /// threshold has now been reached.
    pub fn report(&self, failure: Failure) -> bool {
        let mut failures = self.lock();
        warn!("{failure}");
        failures.push(failure);
        self.reached(failures.len())
    }

    pub fn too_many_errors(&self) -> bool {
        self.reached(self.lock().len())
    }

    #[cfg(test)]
    fn count(&self) -> usize {
        self.lock().len()
    }

    /// Failures in the order they were recorded.
    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reached(&self, count: usize) -> bool {
        self.max_errors != 0 && count >= self.max_errors
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Failure>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
