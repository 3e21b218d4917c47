//! Lookup backends the benchmark runner can time.
//!
//! Each backend turns one key into one elapsed time in milliseconds. Unit
//! conversion is the backend's job so results from different backends can
//! be aggregated and compared directly.

use std::path::PathBuf;
use std::process::Command;

use tracing::trace;

use crate::process::{program_label, run_captured, run_quiet};
use crate::{ProbeError, Result};

/// A timed lookup.
pub trait Backend {
    /// Short label recorded in reports.
    fn name(&self) -> &str;

    /// Look `key` up once and return the elapsed time in milliseconds.
    ///
    /// Any abnormal outcome is an error; the runner does not retry.
    fn invoke(&mut self, key: &str) -> Result<f64>;
}

/// Engine query caller that reports its own latency.
///
/// Runs `<caller> <key> <index>` and reads a single integer of microseconds
/// from stdout.
#[derive(Debug, Clone)]
pub struct EngineCliBackend {
    caller: PathBuf,
    index_file: PathBuf,
}

impl EngineCliBackend {
    #[must_use]
    pub fn new(caller: impl Into<PathBuf>, index_file: impl Into<PathBuf>) -> Self {
        Self {
            caller: caller.into(),
            index_file: index_file.into(),
        }
    }
}

impl Backend for EngineCliBackend {
    fn name(&self) -> &str {
        "engine-cli"
    }

    fn invoke(&mut self, key: &str) -> Result<f64> {
        let execution =
            run_captured(Command::new(&self.caller).arg(key).arg(&self.index_file))?
                .require_success()?;
        let micros = parse_micros(&execution.stdout).ok_or_else(|| ProbeError::BadOutput {
            program: program_label(&self.caller),
            output: execution.stdout.clone(),
        })?;
        trace!(key, micros, "engine self-reported latency");
        Ok(micros_to_ms(micros))
    }
}

/// Generic `grep`-style prefix search, timed from the outside.
///
/// Runs `<search> -m 1 ^<key> <source>` and measures wall-clock time around
/// the child process.
#[derive(Debug, Clone)]
pub struct TextSearchBackend {
    search_bin: PathBuf,
    source: PathBuf,
}

impl TextSearchBackend {
    #[must_use]
    pub fn new(search_bin: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            search_bin: search_bin.into(),
            source: source.into(),
        }
    }
}

impl Backend for TextSearchBackend {
    fn name(&self) -> &str {
        "text-search"
    }

    fn invoke(&mut self, key: &str) -> Result<f64> {
        let execution = run_quiet(
            Command::new(&self.search_bin)
                .arg("-m")
                .arg("1")
                .arg(format!("^{key}"))
                .arg(&self.source),
        )?
        .require_success()?;
        let elapsed_ms = execution.elapsed.as_secs_f64() * 1_000.0;
        trace!(key, elapsed_ms, "text search finished");
        Ok(elapsed_ms)
    }
}

/// Adapts a closure into a [`Backend`].
pub struct FnBackend<F> {
    name: String,
    invoke: F,
}

impl<F> FnBackend<F>
where
    F: FnMut(&str) -> Result<f64>,
{
    pub fn new(name: impl Into<String>, invoke: F) -> Self {
        Self {
            name: name.into(),
            invoke,
        }
    }
}

impl<F> Backend for FnBackend<F>
where
    F: FnMut(&str) -> Result<f64>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&mut self, key: &str) -> Result<f64> {
        (self.invoke)(key)
    }
}

fn parse_micros(stdout: &str) -> Option<u64> {
    stdout.trim().parse::<u64>().ok()
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1_000.0
}
