//! Command-line contract of the lookup engine under verification.
//!
//! ```text
//! engine --prepare <source> --wd <working_dir> --output <index>   # exit 0 = built
//! engine --path <index> --hash <key>                               # exit 1 = found
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::Result;
use crate::config::DEFAULT_FOUND_EXIT_CODE;
use crate::process::{program_label, run_captured};

/// Result of the index build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
    },
}

/// Result of one point query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Found,
    /// Any other exit status, including crashes.
    NotFound { exit_code: Option<i32> },
}

impl QueryOutcome {
    #[must_use]
    pub fn is_found(self) -> bool {
        matches!(self, Self::Found)
    }
}

/// Builds and queries a lookup index.
///
/// Errors are reserved for the harness being unable to ask at all (e.g. the
/// program cannot be spawned); engine-level failures are outcomes.
pub trait LookupEngine {
    fn prepare(
        &mut self,
        source: &Path,
        working_dir: &Path,
        output: &Path,
    ) -> Result<BuildOutcome>;

    fn query(&mut self, index: &Path, key: &str) -> Result<QueryOutcome>;
}

/// The real engine, driven as a child process.
#[derive(Debug, Clone)]
pub struct EngineCli {
    binary: PathBuf,
    found_exit_code: i32,
}

impl EngineCli {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            found_exit_code: DEFAULT_FOUND_EXIT_CODE,
        }
    }

    #[must_use]
    pub fn with_found_exit_code(mut self, code: i32) -> Self {
        self.found_exit_code = code;
        self
    }

    /// `engine --prepare <source> --wd <working_dir> --output <output>`
    #[must_use]
    pub fn prepare_command(&self, source: &Path, working_dir: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--prepare")
            .arg(source)
            .arg("--wd")
            .arg(working_dir)
            .arg("--output")
            .arg(output);
        command
    }

    /// `engine --path <index> --hash <key>`
    #[must_use]
    pub fn query_command(&self, index: &Path, key: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("--path").arg(index).arg("--hash").arg(key);
        command
    }
}

impl LookupEngine for EngineCli {
    fn prepare(
        &mut self,
        source: &Path,
        working_dir: &Path,
        output: &Path,
    ) -> Result<BuildOutcome> {
        let mut command = self.prepare_command(source, working_dir, output);
        info!(command = ?command, "preparing index");
        let execution = run_captured(&mut command)?;
        if execution.succeeded() {
            info!(
                output = %output.display(),
                elapsed_ms = u64::try_from(execution.elapsed.as_millis()).unwrap_or(u64::MAX),
                "index built"
            );
            return Ok(BuildOutcome::Built);
        }

        let diagnostics = if execution.stderr.trim().is_empty() {
            execution.stdout
        } else {
            execution.stderr
        };
        warn!(
            engine = %program_label(&self.binary),
            exit_code = ?execution.exit_code,
            "index build failed"
        );
        Ok(BuildOutcome::Failed {
            exit_code: execution.exit_code,
            diagnostics: diagnostics.trim().to_owned(),
        })
    }

    fn query(&mut self, index: &Path, key: &str) -> Result<QueryOutcome> {
        let execution = run_captured(&mut self.query_command(index, key))?;
        Ok(if execution.exit_code == Some(self.found_exit_code) {
            QueryOutcome::Found
        } else {
            QueryOutcome::NotFound {
                exit_code: execution.exit_code,
            }
        })
    }
}
