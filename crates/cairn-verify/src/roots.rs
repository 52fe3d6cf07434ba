//! Turning a caller's root selection into the initial batch of tasks.

use std::env;

use cairn_snapshot::{EntryType, Manifest, SnapshotError, SnapshotStore, SourceInfo};
use cairn_types::ObjectId;
use chrono::Local;
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};
use crate::progress::TIME_FORMAT;
use crate::task::VerifyTask;

/// Which roots a run starts from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootSelection {
    /// Every manifest in the repository. Takes precedence over `sources`.
    pub all_sources: bool,
    /// Source specifications (`user@host:path`, `user@host` or a path).
    pub sources: Vec<String>,
    /// Object ids to verify as directories.
    pub directory_ids: Vec<String>,
    /// Object ids to verify as files.
    pub file_ids: Vec<String>,
}

impl RootSelection {
    /// Every manifest in the repository.
    pub fn all() -> Self {
        Self {
            all_sources: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all_sources
            && self.sources.is_empty()
            && self.directory_ids.is_empty()
            && self.file_ids.is_empty()
    }
}

/// Host and user that unqualified source paths belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub hostname: String,
    pub username: String,
}

impl Identity {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
        }
    }

    /// Fill in whatever the caller did not supply from the environment
    /// (`HOSTNAME`, then `USER` or `USERNAME`), falling back to
    /// `localhost` and `unknown`.
    pub fn resolve(hostname: Option<String>, username: Option<String>) -> Self {
        let hostname = hostname
            .or_else(|| non_empty_var("HOSTNAME"))
            .unwrap_or_else(|| "localhost".to_string());
        let username = username
            .or_else(|| non_empty_var("USER"))
            .or_else(|| non_empty_var("USERNAME"))
            .unwrap_or_else(|| "unknown".to_string());
        Self { hostname, username }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve `selection` into tasks: snapshot roots first (in manifest listing
/// order), then explicit directory ids, then explicit file ids.
///
/// Any malformed source or id fails the whole resolution, so nothing is
/// scheduled for a partially valid selection.
pub fn resolve_roots(
    snapshots: &dyn SnapshotStore,
    selection: &RootSelection,
    identity: &Identity,
) -> VerifyResult<Vec<VerifyTask>> {
    let mut tasks: Vec<VerifyTask> = load_manifests(snapshots, selection, identity)?
        .iter()
        .filter_map(manifest_root)
        .collect();

    for input in &selection.directory_ids {
        tasks.push(VerifyTask::directory(parse_id(input)?, input.as_str()));
    }
    for input in &selection.file_ids {
        tasks.push(VerifyTask::object(parse_id(input)?, input.as_str(), None));
    }

    debug!(roots = tasks.len(), "resolved verification roots");
    Ok(tasks)
}

fn load_manifests(
    snapshots: &dyn SnapshotStore,
    selection: &RootSelection,
    identity: &Identity,
) -> VerifyResult<Vec<Manifest>> {
    let mut ids = Vec::new();
    if selection.all_sources {
        ids = snapshots.list_manifest_ids(None)?;
    } else {
        for input in &selection.sources {
            let source = SourceInfo::parse(input, &identity.hostname, &identity.username)
                .map_err(|e| match e {
                    SnapshotError::InvalidSource { input, reason } => {
                        VerifyError::InvalidSource { input, reason }
                    }
                    other => VerifyError::Snapshot(other),
                })?;
            ids.extend(snapshots.list_manifest_ids(Some(&source))?);
        }
    }
    Ok(snapshots.load_manifests(&ids)?)
}

/// The task for a manifest's root, labelled `source@start time`.
fn manifest_root(manifest: &Manifest) -> Option<VerifyTask> {
    let root = manifest.root_entry.as_ref()?;
    let label = format!(
        "{}@{}",
        manifest.source,
        manifest.start_time.with_timezone(&Local).format(TIME_FORMAT)
    );
    Some(match root.entry_type {
        EntryType::Directory => VerifyTask::directory(root.object_id, label),
        EntryType::File | EntryType::Symlink => VerifyTask::object(root.object_id, label, None),
    })
}

fn parse_id(input: &str) -> VerifyResult<ObjectId> {
    ObjectId::from_hex(input).map_err(|source| VerifyError::InvalidObjectId {
        input: input.to_string(),
        source,
    })
}
