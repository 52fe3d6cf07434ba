//! Content-addressed object storage for cairn.
//!
//! This crate implements the hash-keyed object store that backs a cairn
//! repository. File contents are stored as blobs and directories as trees,
//! each identified by the BLAKE3 hash of its content (domain-separated by
//! object kind). Identical content is stored once no matter how many
//! snapshots reference it.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing mapping names to object references
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- loose object files under `objects/`
//! - [`CachedObjectStore`] -- read-through content cache over another store
//!
//! # Verification Primitives
//!
//! - [`ObjectStore::verify_object`] is shallow: presence and recorded length.
//! - [`ObjectStore::open`] streams content through a [`VerifyingReader`] that
//!   recomputes the object hash, so a full read detects silent corruption.
//!   [`ReadMode::Uncached`] forces the read to reach durable storage.

pub mod cache;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod reader;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use cache::{CacheStats, CachedObjectStore};
pub use error::{StoreError, StoreResult};
pub use fs::{FsObjectStore, HEADER_SIZE};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use reader::VerifyingReader;
pub use traits::{ObjectStore, ReadMode};
