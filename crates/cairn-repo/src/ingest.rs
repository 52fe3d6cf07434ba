//! Capturing a local path into the object store.

use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use cairn_snapshot::{EntryType, RootEntry};
use cairn_store::{Blob, EntryMode, ObjectStore, Tree, TreeEntry};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{RepoError, RepoResult};

/// Counts from one capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Store everything under `path` and return its root entry.
///
/// Directories are walked bottom-up so every tree is written after its
/// children. Regular files become blobs, symlinks become blobs holding the
/// link target, and anything else (sockets, devices) is skipped.
pub fn ingest_path(objects: &dyn ObjectStore, path: &Path) -> RepoResult<(RootEntry, IngestStats)> {
    let meta = fs::symlink_metadata(path).map_err(|e| RepoError::InvalidSnapshotSource {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut stats = IngestStats::default();

    if meta.is_dir() {
        let object_id = ingest_directory(objects, path, &mut stats)?;
        return Ok((
            RootEntry {
                entry_type: EntryType::Directory,
                object_id,
                size: 0,
            },
            stats,
        ));
    }

    let Some(entry) = ingest_leaf(objects, path, &meta, &mut stats)? else {
        return Err(RepoError::InvalidSnapshotSource {
            path: path.to_path_buf(),
            reason: "not a file, directory or symlink".into(),
        });
    };
    let entry_type = if entry.mode == EntryMode::Symlink {
        EntryType::Symlink
    } else {
        EntryType::File
    };
    Ok((
        RootEntry {
            entry_type,
            object_id: entry.object_id,
            size: entry.size,
        },
        stats,
    ))
}

fn ingest_directory(
    objects: &dyn ObjectStore,
    root: &Path,
    stats: &mut IngestStats,
) -> RepoResult<cairn_types::ObjectId> {
    // Children collected per parent directory until the parent is reached.
    let mut pending: HashMap<PathBuf, Vec<TreeEntry>> = HashMap::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let tree_entry = if entry.file_type().is_dir() {
            let children = pending.remove(path).unwrap_or_default();
            let tree = Tree::new(children);
            let id = objects.write(&tree.to_stored_object()?)?;
            stats.directories += 1;
            debug!(path = %path.display(), entries = tree.len(), "stored directory");
            if entry.depth() == 0 {
                return Ok(id);
            }
            TreeEntry::directory(name, id)
        } else {
            let meta = entry.metadata()?;
            match ingest_leaf(objects, path, &meta, stats)? {
                Some(leaf) => TreeEntry { name, ..leaf },
                None => {
                    warn!(path = %path.display(), "skipping special file");
                    continue;
                }
            }
        };

        if let Some(parent) = path.parent() {
            pending.entry(parent.to_path_buf()).or_default().push(tree_entry);
        }
    }

    Err(RepoError::InvalidSnapshotSource {
        path: root.to_path_buf(),
        reason: "directory vanished while walking".into(),
    })
}

/// Store a non-directory. Returns `None` for entries that cannot be captured.
fn ingest_leaf(
    objects: &dyn ObjectStore,
    path: &Path,
    meta: &Metadata,
    stats: &mut IngestStats,
) -> RepoResult<Option<TreeEntry>> {
    let file_type = meta.file_type();
    let (mode, data) = if file_type.is_symlink() {
        let target = fs::read_link(path)?;
        (
            EntryMode::Symlink,
            target.to_string_lossy().into_owned().into_bytes(),
        )
    } else if file_type.is_file() {
        (file_mode(meta), fs::read(path)?)
    } else {
        return Ok(None);
    };

    let size = data.len() as u64;
    let id = objects.write(&Blob::new(data).to_stored_object())?;
    stats.files += 1;
    stats.bytes += size;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Some(TreeEntry::new(mode, name, size, id)))
}

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> EntryMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        EntryMode::Executable
    } else {
        EntryMode::Regular
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &Metadata) -> EntryMode {
    EntryMode::Regular
}
