use std::io::Read;

use cairn_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{StoredObject, Tree, TreeEntry};

/// How [`ObjectStore::open`] may satisfy a read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Serve from any read-through cache when possible.
    #[default]
    Cached,
    /// Bypass every cache and fetch from durable storage.
    Uncached,
}

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Content-addressing guarantees this:
///   the same data always produces the same ID.
/// - Concurrent reads are always safe (objects are immutable).
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist. The content is not
    /// hash-checked; use [`ObjectStore::open`] for a verified read.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Shallow verification: confirm the object is present and its stored
    /// metadata is consistent, and return its recorded content length.
    ///
    /// Content bytes are not hashed, so silent corruption of the payload is
    /// only caught by a full read through [`ObjectStore::open`].
    fn verify_object(&self, id: &ObjectId) -> StoreResult<u64>;

    /// Open the object's content as a byte stream that fails at end of
    /// stream if the content does not hash back to `id`.
    fn open(&self, id: &ObjectId, mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>>;

    /// Read, hash-check and decode a tree, returning its entries in stored
    /// (name) order.
    fn list_directory(&self, id: &ObjectId) -> StoreResult<Vec<TreeEntry>> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let computed = obj.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Tree::from_stored_object(id, &obj)?.entries)
    }
}
