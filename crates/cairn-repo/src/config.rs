use std::fs;
use std::path::Path;

use cairn_verify::VerifyConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// Name of the configuration file at the repository root.
pub const CONFIG_FILE: &str = "cairn.toml";

/// Repository layout version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Contents of `cairn.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub format_version: u32,
    /// Defaults for `object verify`; command-line flags override them.
    pub verify: VerifyConfig,
    pub cache: CacheConfig,
    pub identity: IdentityConfig,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            verify: VerifyConfig::default(),
            cache: CacheConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

/// Read-through object cache sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Host and user overrides for unqualified source paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl RepoConfig {
    pub fn from_toml_str(s: &str) -> RepoResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RepoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> RepoResult<String> {
        toml::to_string_pretty(self).map_err(|e| RepoError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> RepoResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> RepoResult<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> RepoResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(RepoError::UnsupportedFormat(self.format_version));
        }
        self.verify.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = RepoConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("format_version = 1"));
        assert!(text.contains("[verify]"));
        assert_eq!(RepoConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = RepoConfig::from_toml_str(
            r#"
            format_version = 1

            [verify]
            max_errors = 10
            files_percent = 5

            [identity]
            hostname = "backup-host"
            "#,
        )
        .unwrap();
        assert_eq!(config.verify.max_errors, 10);
        assert_eq!(config.verify.files_percent, 5);
        assert_eq!(config.verify.parallelism, 16);
        assert_eq!(config.identity.hostname.as_deref(), Some("backup-host"));
        assert_eq!(config.identity.username, None);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn rejects_unknown_format_version() {
        assert!(matches!(
            RepoConfig::from_toml_str("format_version = 99"),
            Err(RepoError::UnsupportedFormat(99))
        ));
    }

    #[test]
    fn rejects_invalid_verify_section() {
        let err = RepoConfig::from_toml_str("[verify]\nfiles_percent = 150").unwrap_err();
        assert!(matches!(err, RepoError::Verify(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            RepoConfig::from_toml_str("format_version = ["),
            Err(RepoError::Config(_))
        ));
    }
}
