use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cairn_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject, Tree, TreeEntry};
use crate::traits::{ObjectStore, ReadMode};

/// Hit/miss counters for a [`CachedObjectStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub cached_bytes: u64,
}

#[derive(Clone)]
struct CachedObject {
    kind: ObjectKind,
    data: Arc<[u8]>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ObjectId, CachedObject>,
    order: VecDeque<ObjectId>,
    bytes: u64,
}

/// Read-through content cache in front of another store.
///
/// Directory listings and [`ObjectStore::open`] with [`ReadMode::Cached`] are
/// served from the cache. Content enters the cache after a complete,
/// hash-verified read from the inner store, and the oldest entries are evicted
/// once `capacity_bytes` would be exceeded. Objects larger than the whole
/// cache are streamed from the inner store without buffering.
///
/// [`ReadMode::Uncached`] always reaches the inner store: a cached copy says
/// nothing about the bytes on durable storage.
pub struct CachedObjectStore<S> {
    inner: S,
    capacity_bytes: u64,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: ObjectStore> CachedObjectStore<S> {
    pub fn new(inner: S, capacity_bytes: u64) -> Self {
        Self {
            inner,
            capacity_bytes,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        let cached_bytes = self.state.lock().map(|s| s.bytes).unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached_bytes,
        }
    }

    fn lookup(&self, id: &ObjectId) -> StoreResult<Option<CachedObject>> {
        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let found = state.entries.get(id).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    /// Read `id` from the inner store, check its hash and cache it if it fits.
    fn fill(&self, id: &ObjectId) -> StoreResult<CachedObject> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let obj = self.inner.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let computed = obj.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        let cached = CachedObject {
            kind: obj.kind,
            data: obj.data.into(),
        };
        self.insert(*id, cached.clone())?;
        debug!(%id, kind = %cached.kind, len = cached.data.len(), "cached object content");
        Ok(cached)
    }

    fn insert(&self, id: ObjectId, object: CachedObject) -> StoreResult<()> {
        let len = object.data.len() as u64;
        if len > self.capacity_bytes {
            return Ok(());
        }
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        if state.entries.contains_key(&id) {
            return Ok(());
        }
        while state.bytes + len > self.capacity_bytes {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                state.bytes -= evicted.data.len() as u64;
            }
        }
        state.entries.insert(id, object);
        state.order.push_back(id);
        state.bytes += len;
        Ok(())
    }
}

impl<S: ObjectStore> ObjectStore for CachedObjectStore<S> {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        self.inner.read(id)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        self.inner.write(object)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }

    fn verify_object(&self, id: &ObjectId) -> StoreResult<u64> {
        self.inner.verify_object(id)
    }

    fn open(&self, id: &ObjectId, mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>> {
        if mode == ReadMode::Uncached {
            return self.inner.open(id, ReadMode::Uncached);
        }
        if let Some(cached) = self.lookup(id)? {
            return Ok(Box::new(Cursor::new(cached.data)));
        }
        if self.inner.verify_object(id)? > self.capacity_bytes {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.inner.open(id, mode);
        }
        Ok(Box::new(Cursor::new(self.fill(id)?.data)))
    }

    fn list_directory(&self, id: &ObjectId) -> StoreResult<Vec<TreeEntry>> {
        let cached = match self.lookup(id)? {
            Some(cached) => cached,
            None => self.fill(id)?,
        };
        let obj = StoredObject::new(cached.kind, cached.data.to_vec());
        Ok(Tree::from_stored_object(id, &obj)?.entries)
    }
}
