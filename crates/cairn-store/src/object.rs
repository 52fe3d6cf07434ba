use cairn_crypto::ContentHasher;
use cairn_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content (file contents, symlink targets).
    Blob,
    /// Directory listing: ordered entries mapping names to object references.
    Tree,
}

impl ObjectKind {
    /// One-byte tag used in on-disk object headers.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Blob => 1,
            Self::Tree => 2,
        }
    }

    /// Parse an on-disk tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Blob),
            2 => Some(Self::Tree),
            _ => None,
        }
    }

    /// The domain-separated hasher that names objects of this kind.
    pub fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Tree => &ContentHasher::TREE,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// A stored object: kind tag + content + recorded size.
///
/// `size` is the length the store recorded when the object was written. It
/// normally equals `data.len()`; a divergence is storage corruption that a
/// shallow verification reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The content bytes of the object.
    pub data: Vec<u8>,
    /// The recorded size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Subtree / directory (0o040000).
    Directory,
}

impl EntryMode {
    /// Octal mode value (for display).
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
        }
    }

    /// Returns `true` for entries whose object is itself a tree.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single entry in a tree object.
///
/// Every variant of directory entry (file, executable, symlink, subdirectory)
/// shares this shape, so consumers read the name, size and object reference
/// uniformly and branch only on [`EntryMode::is_dir`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// File mode (regular, executable, symlink, directory).
    pub mode: EntryMode,
    /// Entry name (filename or directory name).
    pub name: String,
    /// Content length of the referenced object. Zero for directories.
    pub size: u64,
    /// Content-addressed ID of the referenced object.
    pub object_id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<String>, size: u64, object_id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            size,
            object_id,
        }
    }

    /// Shorthand for a directory entry.
    pub fn directory(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self::new(EntryMode::Directory, name, 0, object_id)
    }

    /// Shorthand for a regular file entry.
    pub fn file(name: impl Into<String>, size: u64, object_id: ObjectId) -> Self {
        Self::new(EntryMode::Regular, name, size, object_id)
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// Directory listing object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Sorted entries in this directory.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a new tree with the given entries.
    ///
    /// Entries are sorted by name for deterministic hashing.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    /// Decode from a `StoredObject` that was read under `id`.
    pub fn from_stored_object(id: &ObjectId, obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Tree {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("expected tree, got {}", obj.kind),
            });
        }
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("undecodable tree: {e}"),
        })
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_entries_sorted() {
        let entries = vec![
            TreeEntry::file("zebra.txt", 1, ObjectId::from_hash([1; 32])),
            TreeEntry::file("alpha.txt", 2, ObjectId::from_hash([2; 32])),
            TreeEntry::directory("middle", ObjectId::from_hash([3; 32])),
        ];
        let tree = Tree::new(entries);
        assert_eq!(tree.entries[0].name, "alpha.txt");
        assert_eq!(tree.entries[1].name, "middle");
        assert_eq!(tree.entries[2].name, "zebra.txt");
    }

    #[test]
    fn tree_roundtrip_preserves_sizes() {
        let tree = Tree::new(vec![
            TreeEntry::file("file.txt", 7, ObjectId::from_bytes(b"content")),
            TreeEntry::directory("subdir", ObjectId::from_bytes(b"tree")),
        ]);
        let stored = tree.to_stored_object().unwrap();
        let id = stored.compute_id();
        let decoded = Tree::from_stored_object(&id, &stored).unwrap();
        assert_eq!(tree, decoded);
        assert_eq!(decoded.get("file.txt").unwrap().size, 7);
    }

    #[test]
    fn blob_is_not_a_tree() {
        let stored = Blob::new(b"not a tree".to_vec()).to_stored_object();
        let err = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn garbage_tree_is_corrupt() {
        let stored = StoredObject::new(ObjectKind::Tree, b"{ nope".to_vec());
        let err = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn only_directories_are_dirs() {
        assert!(EntryMode::Directory.is_dir());
        for mode in [EntryMode::Regular, EntryMode::Executable, EntryMode::Symlink] {
            assert!(!mode.is_dir());
        }
    }

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree] {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag(0), None);
    }

    #[test]
    fn different_kinds_produce_different_ids() {
        let blob = StoredObject::new(ObjectKind::Blob, b"same".to_vec());
        let tree = StoredObject::new(ObjectKind::Tree, b"same".to_vec());
        assert_ne!(blob.compute_id(), tree.compute_id());
    }

    #[test]
    fn entry_mode_display_is_octal() {
        assert_eq!(EntryMode::Directory.to_string(), "040000");
        assert_eq!(EntryMode::Regular.to_string(), "100644");
    }
}
