//! Query configuration via `hashmatch.toml`
//!
//! Holds the defaults a [`HashMatchQuery`](crate::search::HashMatchQuery)
//! is built with when the caller does not set them explicitly. A default
//! file with comments can be written next to the index; edit it to change
//! settings.

use hashmatch_core::{HashMatchError, HashMatchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the index directory.
pub const CONFIG_FILE_NAME: &str = "hashmatch.toml";

/// Query configuration loaded from `hashmatch.toml`.
///
/// # Example
///
/// ```toml
/// # Candidate limit K per segment (<= 0 returns nothing)
/// candidates = 1000
///
/// # Doc ids scanned between cancellation checks (>= 1)
/// cancel_check_interval = 1024
///
/// # Run segments of one query on the rayon pool
/// parallel_segments = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default candidate limit per segment.
    #[serde(default = "default_candidates")]
    pub candidates: i64,
    /// Doc ids the candidate iterator scans between cancellation checks.
    #[serde(default = "default_cancel_check_interval")]
    pub cancel_check_interval: u32,
    /// Execute segments in parallel.
    #[serde(default = "default_parallel_segments")]
    pub parallel_segments: bool,
}

fn default_candidates() -> i64 {
    1000
}

fn default_cancel_check_interval() -> u32 {
    1024
}

fn default_parallel_segments() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            cancel_check_interval: default_cancel_check_interval(),
            parallel_segments: default_parallel_segments(),
        }
    }
}

impl QueryConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `cancel_check_interval` is zero.
    pub fn validate(&self) -> HashMatchResult<()> {
        if self.cancel_check_interval == 0 {
            return Err(HashMatchError::invalid_input(
                "cancel_check_interval in hashmatch.toml must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# hashmatch query configuration
#
# Candidate limit K per segment (default: 1000).
# The K-th greatest overlap count becomes the threshold; documents tied
# with it are all returned. Values <= 0 return no candidates.
candidates = 1000

# Document ids the candidate iterator scans between cancellation checks
# (default: 1024, must be >= 1).
cancel_check_interval = 1024

# Run the segments of one query in parallel on the rayon pool (default: true).
parallel_segments = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> HashMatchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QueryConfig = toml::from_str(&content).map_err(|e| {
            HashMatchError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> HashMatchResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> HashMatchResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            HashMatchError::invalid_input(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
