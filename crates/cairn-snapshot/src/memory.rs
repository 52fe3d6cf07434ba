//! In-memory manifest store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{Result, SnapshotError};
use crate::manifest::{Manifest, ManifestId};
use crate::source::SourceInfo;
use crate::traits::SnapshotStore;

/// An in-memory implementation of [`SnapshotStore`].
///
/// Manifests live in a `BTreeMap` keyed by id behind a `RwLock`, so listing
/// order falls out of the map order. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    manifests: RwLock<BTreeMap<ManifestId, Manifest>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, manifest: &Manifest) -> Result<()> {
        let mut manifests = self
            .manifests
            .write()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;
        manifests.insert(manifest.id, manifest.clone());
        Ok(())
    }

    fn list_manifest_ids(&self, filter: Option<&SourceInfo>) -> Result<Vec<ManifestId>> {
        let manifests = self
            .manifests
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;
        Ok(manifests
            .values()
            .filter(|m| filter.map_or(true, |f| m.source.matches(f)))
            .map(|m| m.id)
            .collect())
    }

    fn load_manifests(&self, ids: &[ManifestId]) -> Result<Vec<Manifest>> {
        let manifests = self
            .manifests
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;
        ids.iter()
            .map(|id| manifests.get(id).cloned().ok_or(SnapshotError::NotFound(*id)))
            .collect()
    }
}
