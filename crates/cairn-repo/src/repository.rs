use std::fs;
use std::path::{Path, PathBuf};

use cairn_snapshot::{FsSnapshotStore, Manifest, ManifestId, SnapshotStore, SourceInfo};
use cairn_store::{CachedObjectStore, FsObjectStore};
use cairn_verify::{resolve_roots, Identity, RootSelection, VerifyConfig, VerifySummary, Verifier};
use chrono::Utc;
use tracing::info;

use crate::config::{RepoConfig, CONFIG_FILE};
use crate::error::{RepoError, RepoResult};
use crate::ingest::ingest_path;

/// An opened repository.
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
    objects: CachedObjectStore<FsObjectStore>,
    snapshots: FsSnapshotStore,
}

impl Repository {
    /// Create a new repository at `path` and open it.
    pub fn init(path: impl AsRef<Path>, config: RepoConfig) -> RepoResult<Self> {
        let root = path.as_ref();
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(RepoError::AlreadyExists(root.to_path_buf()));
        }
        config.validate()?;
        fs::create_dir_all(root)?;
        config.save(&config_path)?;
        info!(root = %root.display(), "initialized repository");
        Self::open(root)
    }

    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let root = path.as_ref().to_path_buf();
        let config_path = root.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(RepoError::NotARepository(root));
        }
        let config = RepoConfig::load(&config_path)?;
        let objects = CachedObjectStore::new(
            FsObjectStore::open(root.join("objects"))?,
            config.cache.capacity_bytes,
        );
        let snapshots = FsSnapshotStore::open(root.join("snapshots"))?;
        Ok(Self {
            root,
            config,
            objects,
            snapshots,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn objects(&self) -> &CachedObjectStore<FsObjectStore> {
        &self.objects
    }

    pub fn snapshots(&self) -> &FsSnapshotStore {
        &self.snapshots
    }

    /// Capture `path` and record it as a snapshot of `source`.
    pub fn create_snapshot(
        &self,
        path: &Path,
        source: SourceInfo,
        description: impl Into<String>,
    ) -> RepoResult<Manifest> {
        let start_time = Utc::now();
        let (root_entry, stats) = ingest_path(&self.objects, path)?;
        let manifest = Manifest {
            id: ManifestId::new(),
            source,
            description: description.into(),
            start_time,
            end_time: Utc::now(),
            root_entry: Some(root_entry),
        };
        self.snapshots.save(&manifest)?;
        info!(
            id = %manifest.id,
            source = %manifest.source,
            files = stats.files,
            directories = stats.directories,
            bytes = stats.bytes,
            "snapshot created"
        );
        Ok(manifest)
    }

    /// Manifests of `filter` (all when `None`), oldest first.
    pub fn list_snapshots(&self, filter: Option<&SourceInfo>) -> RepoResult<Vec<Manifest>> {
        let ids = self.snapshots.list_manifest_ids(filter)?;
        Ok(self.snapshots.load_manifests(&ids)?)
    }

    /// Verify everything reachable from `selection`.
    ///
    /// Root-resolution problems are errors; failures found while walking are
    /// returned in the summary (see [`VerifySummary::into_result`]).
    pub fn verify(
        &self,
        selection: &RootSelection,
        identity: &Identity,
        config: VerifyConfig,
    ) -> RepoResult<VerifySummary> {
        let verifier = Verifier::new(&self.objects, config)?;
        let roots = resolve_roots(&self.snapshots, selection, identity)?;
        Ok(verifier.walk(roots))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}
