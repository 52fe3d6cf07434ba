//! Snapshot source identification: `user@host:path`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapshotError};

/// Identifies what was backed up: a path on a host, captured as a user.
///
/// An empty `path` denotes every path of `user@host`; it only appears in
/// filters, never in a stored manifest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceInfo {
    pub host: String,
    pub user_name: String,
    pub path: String,
}

impl SourceInfo {
    pub fn new(host: impl Into<String>, user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user_name: user_name.into(),
            path: path.into(),
        }
    }

    /// Parse a source specification.
    ///
    /// Accepted forms:
    /// - `user@host:path`: one path of one user on one host
    /// - `user@host`: every path of that user on that host
    /// - `path`: a local path for the default user and host; relative paths
    ///   are resolved against the current directory
    pub fn parse(input: &str, default_host: &str, default_user: &str) -> Result<Self> {
        let invalid = |reason: &str| SnapshotError::InvalidSource {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty source"));
        }

        if let Some((user, rest)) = trimmed.split_once('@') {
            let (host, path) = match rest.split_once(':') {
                Some((host, path)) => {
                    if path.is_empty() {
                        return Err(invalid("empty path after ':'"));
                    }
                    (host, path)
                }
                None => (rest, ""),
            };
            if user.is_empty() {
                return Err(invalid("empty user name"));
            }
            if host.is_empty() {
                return Err(invalid("empty host name"));
            }
            return Ok(Self::new(host, user, path));
        }

        let absolute = std::path::absolute(Path::new(trimmed))
            .map_err(|e| invalid(&format!("cannot resolve path: {e}")))?;
        Ok(Self::new(
            default_host,
            default_user,
            absolute.to_string_lossy().into_owned(),
        ))
    }

    /// Whether this (concrete) source is selected by `filter`.
    pub fn matches(&self, filter: &SourceInfo) -> bool {
        self.host == filter.host
            && self.user_name == filter.user_name
            && (filter.path.is_empty() || self.path == filter.path)
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}@{}", self.user_name, self.host)
        } else {
            write!(f, "{}@{}:{}", self.user_name, self.host, self.path)
        }
    }
}
