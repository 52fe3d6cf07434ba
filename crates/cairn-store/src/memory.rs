use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::RwLock;

use cairn_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::reader::VerifyingReader;
use crate::traits::{ObjectStore, ReadMode};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. There is no cache, so both read modes
/// behave the same.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `object` under `id` without checking that `id` names it.
    ///
    /// Fault injection for tests: this is how corrupted payloads, bogus
    /// recorded lengths or kind confusion are planted in a store.
    pub fn insert_unchecked(&self, id: ObjectId, object: StoredObject) -> StoreResult<()> {
        self.write_map()?.insert(id, object);
        Ok(())
    }

    fn read_map(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<ObjectId, StoredObject>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_map(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<ObjectId, StoredObject>>> {
        self.objects
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.read_map()?.get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        // Content-addressing: an existing entry already holds these bytes.
        self.write_map()?
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(id))
    }

    fn verify_object(&self, id: &ObjectId) -> StoreResult<u64> {
        let map = self.read_map()?;
        let obj = map.get(id).ok_or(StoreError::NotFound(*id))?;
        if obj.size != obj.data.len() as u64 {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!(
                    "recorded length {} but {} bytes stored",
                    obj.size,
                    obj.data.len()
                ),
            });
        }
        Ok(obj.size)
    }

    fn open(&self, id: &ObjectId, _mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let (kind, size) = (obj.kind, obj.size);
        Ok(Box::new(VerifyingReader::new(
            Cursor::new(obj.data),
            kind,
            *id,
            size,
        )))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
