use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

/// Tuning for a verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Stop expanding directories once this many failures are recorded.
    /// Zero means unlimited.
    pub max_errors: usize,
    /// Percentage (0..=100) of objects whose full content is re-read.
    pub files_percent: u8,
    /// Number of worker threads.
    pub parallelism: usize,
    /// Minimum delay between progress lines, in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_errors: 0,
            files_percent: 0,
            parallelism: 16,
            progress_interval_ms: 1000,
        }
    }
}

impl VerifyConfig {
    pub fn validate(&self) -> VerifyResult<()> {
        if self.files_percent > 100 {
            return Err(VerifyError::InvalidConfig(format!(
                "files percent must be between 0 and 100, got {}",
                self.files_percent
            )));
        }
        if self.parallelism == 0 {
            return Err(VerifyError::InvalidConfig(
                "parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
