//! Manifest store backed by one JSON file per manifest.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, SnapshotError};
use crate::manifest::{Manifest, ManifestId};
use crate::source::SourceInfo;
use crate::traits::SnapshotStore;

/// Stores each manifest as `<root>/<manifest id>.json`.
#[derive(Debug)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    /// Open (or create) a manifest directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self, id: &ManifestId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_manifest(&self, id: &ManifestId) -> Result<Manifest> {
        let bytes = match fs::read(self.manifest_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(*id))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Ids of every manifest file in the directory, sorted.
    fn all_ids(&self) -> Result<Vec<ManifestId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<ManifestId>() {
                Ok(id) => ids.push(id),
                Err(e) => warn!("skipping stray file {:?}: {}", path, e),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn save(&self, manifest: &Manifest) -> Result<()> {
        let data = serde_json::to_vec_pretty(manifest)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.manifest_path(&manifest.id))
            .map_err(|e| SnapshotError::Io(e.error))?;
        debug!(id = %manifest.id, source = %manifest.source, "manifest saved");
        Ok(())
    }

    fn list_manifest_ids(&self, filter: Option<&SourceInfo>) -> Result<Vec<ManifestId>> {
        let ids = self.all_ids()?;
        let Some(filter) = filter else {
            return Ok(ids);
        };
        let mut selected = Vec::new();
        for id in ids {
            if self.read_manifest(&id)?.source.matches(filter) {
                selected.push(id);
            }
        }
        Ok(selected)
    }

    fn load_manifests(&self, ids: &[ManifestId]) -> Result<Vec<Manifest>> {
        ids.iter().map(|id| self.read_manifest(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{EntryType, RootEntry};
    use cairn_types::ObjectId;
    use chrono::Utc;

    fn temp_store() -> (tempfile::TempDir, FsSnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::open(dir.path().join("snapshots")).unwrap();
        (dir, store)
    }

    fn manifest(path: &str) -> Manifest {
        let now = Utc::now();
        Manifest {
            id: ManifestId::new(),
            source: SourceInfo::new("host", "user", path),
            description: "nightly".into(),
            start_time: now,
            end_time: now,
            root_entry: Some(RootEntry {
                entry_type: EntryType::Directory,
                object_id: ObjectId::from_hash([4; 32]),
                size: 0,
            }),
        }
    }

    #[test]
    fn save_and_reload() {
        let (_dir, store) = temp_store();
        let m = manifest("/srv");
        store.save(&m).unwrap();

        let ids = store.list_manifest_ids(None).unwrap();
        assert_eq!(ids, vec![m.id]);
        assert_eq!(store.load_manifests(&ids).unwrap(), vec![m]);
    }

    #[test]
    fn filter_reads_sources() {
        let (_dir, store) = temp_store();
        let srv = manifest("/srv");
        store.save(&srv).unwrap();
        store.save(&manifest("/home")).unwrap();

        let filter = SourceInfo::new("host", "user", "/srv");
        assert_eq!(store.list_manifest_ids(Some(&filter)).unwrap(), vec![srv.id]);
        assert_eq!(store.list_sources().unwrap().len(), 2);
    }

    #[test]
    fn stray_files_are_ignored() {
        let (_dir, store) = temp_store();
        fs::write(store.root().join("README.txt"), b"hi").unwrap();
        fs::write(store.root().join("not-a-uuid.json"), b"{}").unwrap();
        assert!(store.list_manifest_ids(None).unwrap().is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.load_manifests(&[ManifestId::new()]),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_manifest_is_a_serialization_error() {
        let (_dir, store) = temp_store();
        let id = ManifestId::new();
        fs::write(store.root().join(format!("{id}.json")), b"{ broken").unwrap();
        assert!(matches!(
            store.load_manifests(&[id]),
            Err(SnapshotError::Serialization(_))
        ));
    }
}
