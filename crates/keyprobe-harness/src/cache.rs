//! OS page-cache invalidation before each measurement.

use tracing::debug;

use crate::Result;
use crate::config::CacheDropConfig;
use crate::process::{run_quiet, shell_command};

/// Something that can evict OS file/page caches.
pub trait CacheDropper {
    fn drop_caches(&mut self) -> Result<()>;
}

/// Does nothing. Used when cache dropping is disabled and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheDropper;

impl CacheDropper for NoopCacheDropper {
    fn drop_caches(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Runs a shell script (by default `sync; echo 3 > /proc/sys/vm/drop_caches`
/// under `sudo`).
#[derive(Debug, Clone)]
pub struct ShellCacheDropper {
    script: String,
    use_sudo: bool,
    drops: u64,
}

impl ShellCacheDropper {
    #[must_use]
    pub fn new(script: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            script: script.into(),
            use_sudo,
            drops: 0,
        }
    }

    /// Number of successful drops so far.
    #[must_use]
    pub fn drops(&self) -> u64 {
        self.drops
    }
}

impl CacheDropper for ShellCacheDropper {
    fn drop_caches(&mut self) -> Result<()> {
        run_quiet(&mut shell_command(&self.script, self.use_sudo))?.require_success()?;
        self.drops += 1;
        debug!(drops = self.drops, "page cache dropped");
        Ok(())
    }
}

/// Pick the dropper described by `config`.
#[must_use]
pub fn dropper_from_config(config: &CacheDropConfig) -> Box<dyn CacheDropper> {
    if config.enabled {
        Box::new(ShellCacheDropper::new(config.command.clone(), config.use_sudo))
    } else {
        Box::new(NoopCacheDropper)
    }
}
