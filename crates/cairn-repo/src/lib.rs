//! A cairn repository on disk.
//!
//! ```text
//! <root>/
//!   cairn.toml     repository configuration
//!   objects/       content-addressed objects (blobs and trees)
//!   snapshots/     one JSON manifest per snapshot
//! ```
//!
//! [`Repository`] ties the object store and manifest store together,
//! captures local directories as snapshots and verifies what was stored.

pub mod config;
pub mod error;
pub mod ingest;
pub mod repository;

pub use config::{CacheConfig, IdentityConfig, RepoConfig, CONFIG_FILE, FORMAT_VERSION};
pub use error::{RepoError, RepoResult};
pub use ingest::{ingest_path, IngestStats};
pub use repository::Repository;
