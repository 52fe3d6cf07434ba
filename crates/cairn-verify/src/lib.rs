//! Integrity verification for cairn repositories.
//!
//! A [`Verifier`] walks the object graph reachable from a set of roots
//! (snapshot manifests or explicit object ids), confirming that every
//! referenced object is present and correctly sized, and re-reading a random
//! sample of objects end to end to catch silent corruption.
//!
//! The walk is concurrent. Each object id is scheduled at most once per run
//! ([`DedupTracker`]); directories are expanded ahead of file content so the
//! shape of the graph is known early; and an [`ErrorBudget`] stops further
//! expansion once enough failures have been recorded.

pub mod budget;
pub mod config;
pub mod error;
pub mod progress;
pub mod roots;
pub mod task;
pub mod tracker;
pub mod verifier;

pub use budget::{ErrorBudget, Failure, FailureKind};
pub use config::VerifyConfig;
pub use error::{VerifyError, VerifyResult};
pub use progress::{estimate, format_duration, ProgressReport};
pub use roots::{resolve_roots, Identity, RootSelection};
pub use task::VerifyTask;
pub use tracker::DedupTracker;
pub use verifier::{Verifier, VerifySummary};
