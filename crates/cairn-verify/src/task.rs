use cairn_store::TreeEntry;
use cairn_types::ObjectId;

/// One unit of verification work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyTask {
    /// List a tree and schedule its children.
    Directory { id: ObjectId, path: String },
    /// Verify a single object. `expected_len` is `None` when no parent
    /// recorded a size (snapshot roots and explicit ids).
    Object {
        id: ObjectId,
        path: String,
        expected_len: Option<u64>,
    },
}

impl VerifyTask {
    pub fn directory(id: ObjectId, path: impl Into<String>) -> Self {
        Self::Directory {
            id,
            path: path.into(),
        }
    }

    pub fn object(id: ObjectId, path: impl Into<String>, expected_len: Option<u64>) -> Self {
        Self::Object {
            id,
            path: path.into(),
            expected_len,
        }
    }

    /// Task for a child discovered while listing the directory at
    /// `parent_path`. Non-directories carry the size the listing recorded.
    pub fn child(parent_path: &str, entry: &TreeEntry) -> Self {
        let path = format!("{parent_path}/{}", entry.name);
        if entry.is_dir() {
            Self::directory(entry.object_id, path)
        } else {
            Self::object(entry.object_id, path, Some(entry.size))
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Self::Directory { id, .. } | Self::Object { id, .. } => *id,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Directory { path, .. } | Self::Object { path, .. } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}
