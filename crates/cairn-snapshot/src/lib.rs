//! Snapshot manifests for cairn.
//!
//! A snapshot manifest records one backup run: which source was captured
//! (`user@host:path`), when, and the object identifier of the captured root.
//! Manifests are the human-readable entry points into the object graph,
//! analogous to git refs.
//!
//! # Modules
//!
//! - [`error`]: Error types for manifest operations
//! - [`manifest`]: [`Manifest`], [`ManifestId`], [`RootEntry`], [`EntryType`]
//! - [`source`]: [`SourceInfo`] parsing and matching
//! - [`traits`]: The [`SnapshotStore`] trait defining the storage interface
//! - [`memory`]: In-memory [`InMemorySnapshotStore`] for tests
//! - [`fs`]: JSON-file [`FsSnapshotStore`]

pub mod error;
pub mod fs;
pub mod manifest;
pub mod memory;
pub mod source;
pub mod traits;

pub use error::{Result, SnapshotError};
pub use fs::FsSnapshotStore;
pub use manifest::{EntryType, Manifest, ManifestId, RootEntry};
pub use memory::InMemorySnapshotStore;
pub use source::SourceInfo;
pub use traits::SnapshotStore;
