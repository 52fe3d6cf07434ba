//! The [`SnapshotStore`] trait defining the manifest storage interface.

use crate::error::Result;
use crate::manifest::{Manifest, ManifestId};
use crate::source::SourceInfo;

/// Storage backend for snapshot manifests.
///
/// Implementations must be thread-safe (`Send + Sync`). Manifests are
/// immutable once saved.
pub trait SnapshotStore: Send + Sync {
    /// Persist a manifest under its id.
    fn save(&self, manifest: &Manifest) -> Result<()>;

    /// List ids of manifests whose source matches `filter` (all manifests
    /// when `None`), sorted ascending, i.e. oldest first.
    fn list_manifest_ids(&self, filter: Option<&SourceInfo>) -> Result<Vec<ManifestId>>;

    /// Load manifests in the order of `ids`. Any unknown id fails the call.
    fn load_manifests(&self, ids: &[ManifestId]) -> Result<Vec<Manifest>>;

    /// Every distinct source that has at least one manifest, sorted.
    fn list_sources(&self) -> Result<Vec<SourceInfo>> {
        let ids = self.list_manifest_ids(None)?;
        let mut sources: Vec<SourceInfo> = self
            .load_manifests(&ids)?
            .into_iter()
            .map(|m| m.source)
            .collect();
        sources.sort();
        sources.dedup();
        Ok(sources)
    }
}
