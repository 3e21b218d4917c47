//! Run configuration with defaults and validation.
//!
//! Values come from the command line (see [`crate::cli`]); the cache-drop
//! command may also be overridden from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_KEY_WIDTH, DEFAULT_SEED, ProbeError, Result};

/// Replaces the cache-drop script when set.
pub const ENV_DROP_CACHES_CMD: &str = "KEYPROBE_DROP_CACHES_CMD";
/// Disables cache dropping when set to `1`/`true`.
pub const ENV_NO_DROP_CACHES: &str = "KEYPROBE_NO_DROP_CACHES";

/// Script run (through `sudo sh -c`) before every measurement.
pub const DEFAULT_DROP_CACHES_CMD: &str = "sync; echo 3 > /proc/sys/vm/drop_caches";
/// Verifier progress cadence, in lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 10_000;
/// Exit code the engine's point query uses to say "found".
pub const DEFAULT_FOUND_EXIT_CODE: i32 = 1;
/// File name of the index built inside the working directory.
pub const DEFAULT_INDEX_FILE_NAME: &str = "result.btree";

/// Inputs to the sampler and extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Any integer; negative seeds are accepted.
    pub seed: i64,
    pub sample_count: usize,
    pub universe_size: u64,
    pub key_width: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            sample_count: 0,
            universe_size: 1,
            key_width: DEFAULT_KEY_WIDTH,
        }
    }
}

impl SamplingConfig {
    /// Generator seed: the two's-complement bits of `seed`.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.seed as u64
    }

    pub fn validate(&self) -> Result<()> {
        if self.universe_size == 0 {
            return Err(ProbeError::invalid("universe size must be >= 1"));
        }
        if self.key_width == 0 {
            return Err(ProbeError::invalid("key width must be >= 1"));
        }
        Ok(())
    }
}

/// How caches are dropped before each measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDropConfig {
    pub enabled: bool,
    pub command: String,
    pub use_sudo: bool,
}

impl Default for CacheDropConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: DEFAULT_DROP_CACHES_CMD.to_owned(),
            use_sudo: true,
        }
    }
}

impl CacheDropConfig {
    /// Apply [`ENV_DROP_CACHES_CMD`] and [`ENV_NO_DROP_CACHES`] on top of
    /// `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_DROP_CACHES_CMD).ok(),
            std::env::var(ENV_NO_DROP_CACHES).ok(),
        )
    }

    fn with_overrides(mut self, command: Option<String>, disable: Option<String>) -> Self {
        if let Some(command) = command.filter(|value| !value.trim().is_empty()) {
            self.command = command;
        }
        if disable.is_some_and(|value| is_truthy(&value)) {
            self.enabled = false;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.command.trim().is_empty() {
            return Err(ProbeError::invalid("cache drop command must not be empty"));
        }
        Ok(())
    }
}

/// Correctness verifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Emit a progress event every this many lines.
    pub progress_every: u64,
    /// Keep at most this many failing keys; `None` keeps all of them.
    pub failure_report_limit: Option<usize>,
    pub found_exit_code: i32,
    pub key_delimiter: char,
    pub index_file_name: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            progress_every: DEFAULT_PROGRESS_EVERY,
            failure_report_limit: None,
            found_exit_code: DEFAULT_FOUND_EXIT_CODE,
            key_delimiter: ':',
            index_file_name: DEFAULT_INDEX_FILE_NAME.to_owned(),
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_every == 0 {
            return Err(ProbeError::invalid("progress cadence must be >= 1"));
        }
        let name = self.index_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ProbeError::invalid(format!(
                "index file name must be a plain file name, got {:?}",
                self.index_file_name
            )));
        }
        Ok(())
    }

    /// Where the built index lives for a given working directory.
    #[must_use]
    pub fn index_path(&self, working_dir: &std::path::Path) -> PathBuf {
        working_dir.join(&self.index_file_name)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
