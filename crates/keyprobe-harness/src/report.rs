//! JSON reports for benchmark and verification runs.
//!
//! Reports are written as deterministic pretty JSON so they can be diffed
//! and compared across runs. A benchmark report carries a fingerprint of its
//! key batch; two reports are only comparable if their fingerprints match.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::runner::{BenchmarkResult, LatencySummary};
use crate::sampler::{RNG_ALGORITHM, RNG_VERSION};
use crate::verifier::{VerdictKind, VerificationVerdict};
use crate::{ProbeError, Result};

/// Schema tag for [`BenchmarkReport`].
pub const BENCHMARK_SCHEMA_V1: &str = "keyprobe.benchmark.v1";
/// Schema tag for [`VerificationReport`].
pub const VERIFY_SCHEMA_V1: &str = "keyprobe.verify.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngInfo {
    pub algorithm: String,
    pub version: String,
}

impl Default for RngInfo {
    fn default() -> Self {
        Self {
            algorithm: RNG_ALGORITHM.to_owned(),
            version: RNG_VERSION.to_owned(),
        }
    }
}

/// Everything needed to reproduce and compare one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub schema_version: String,
    pub backend: String,
    pub source_path: String,
    pub seed: i64,
    pub rng: RngInfo,
    pub universe_size: u64,
    pub key_width: usize,
    pub requested_samples: usize,
    pub extracted_samples: usize,
    /// SHA-256 over the shuffled key batch, newline-joined.
    pub key_batch_sha256: String,
    pub unit: String,
    /// Every measurement, warm-up first.
    pub measurements: Vec<f64>,
    pub warm_up: Option<f64>,
    /// `None` when fewer than two measurements were taken.
    pub mean: Option<f64>,
    pub latency: Option<LatencySummary>,
    pub started_unix_ms: u64,
    pub finished_unix_ms: u64,
}

impl BenchmarkReport {
    /// Mean latency, or [`ProbeError::NoData`].
    pub fn mean_ms(&self) -> Result<f64> {
        self.mean.ok_or(ProbeError::NoData {
            measurements: self.measurements.len(),
        })
    }

    pub(crate) fn fill_result(&mut self, result: &BenchmarkResult) {
        self.measurements.clone_from(&result.measurements_ms);
        self.warm_up = result.warm_up_ms();
        self.mean = result.aggregate_ms().ok();
        self.latency = result.summary();
    }
}

/// Outcome of one verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub schema_version: String,
    pub engine: String,
    pub source_path: String,
    pub verdict: VerificationVerdict,
    pub started_unix_ms: u64,
    pub finished_unix_ms: u64,
}

impl VerificationReport {
    #[must_use]
    pub fn new(
        engine: &Path,
        source: &Path,
        verdict: VerificationVerdict,
        started_unix_ms: u64,
    ) -> Self {
        Self {
            schema_version: VERIFY_SCHEMA_V1.to_owned(),
            engine: engine.display().to_string(),
            source_path: source.display().to_string(),
            verdict,
            started_unix_ms,
            finished_unix_ms: unix_ms_now(),
        }
    }

    /// Human-readable summary printed at the end of a run.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let verdict = &self.verdict;
        match verdict.kind {
            VerdictKind::Success => format!(
                "Success: {} keys found in {}",
                verdict.lines_checked,
                verdict.index_path.display()
            ),
            VerdictKind::BuildFailed => format!(
                "Preparing failed\n{}",
                verdict.build_diagnostics.as_deref().unwrap_or("")
            ),
            VerdictKind::Failed => {
                let mut out = format!(
                    "Failed: {} of {} keys not found",
                    verdict.failure_count, verdict.lines_checked
                );
                for key in verdict.failing_keys.iter().take(SUMMARY_KEY_SAMPLE) {
                    out.push_str("\n  missing: ");
                    out.push_str(key);
                }
                let unlisted = verdict.failure_count
                    - verdict.failing_keys.len().min(SUMMARY_KEY_SAMPLE) as u64;
                if unlisted > 0 {
                    out.push_str(&format!("\n  ... and {unlisted} more"));
                }
                out
            }
        }
    }
}

const SUMMARY_KEY_SAMPLE: usize = 10;

/// Mean-latency comparison of two runs over the same key batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportComparison {
    pub baseline_backend: String,
    pub candidate_backend: String,
    pub key_batch_sha256: String,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    /// `candidate_mean / baseline_mean`.
    pub ratio: f64,
    pub unit: String,
}

impl ReportComparison {
    /// One-line summary over `key_count` keys, with a short fingerprint.
    #[must_use]
    pub fn render_summary(&self, key_count: usize) -> String {
        let batch: String = self.key_batch_sha256.chars().take(12).collect();
        format!(
            "{} vs {} over {key_count} keys (batch {batch}): {:.3}{unit} vs {:.3}{unit}, ratio {:.3}",
            self.candidate_backend,
            self.baseline_backend,
            self.candidate_mean,
            self.baseline_mean,
            self.ratio,
            unit = self.unit,
        )
    }
}

/// Compare two benchmark reports taken over the same keys.
pub fn compare_reports(
    baseline: &BenchmarkReport,
    candidate: &BenchmarkReport,
) -> Result<ReportComparison> {
    if baseline.key_batch_sha256 != candidate.key_batch_sha256 {
        return Err(ProbeError::invalid(format!(
            "reports cover different key batches: baseline={} (seed {}, {} keys) candidate={} (seed {}, {} keys)",
            baseline.key_batch_sha256,
            baseline.seed,
            baseline.extracted_samples,
            candidate.key_batch_sha256,
            candidate.seed,
            candidate.extracted_samples
        )));
    }
    if baseline.unit != candidate.unit {
        return Err(ProbeError::invalid(format!(
            "unit mismatch baseline={} candidate={}",
            baseline.unit, candidate.unit
        )));
    }

    let baseline_mean = baseline.mean_ms()?;
    let candidate_mean = candidate.mean_ms()?;
    if baseline_mean <= 0.0 {
        return Err(ProbeError::invalid("baseline mean must be > 0"));
    }

    Ok(ReportComparison {
        baseline_backend: baseline.backend.clone(),
        candidate_backend: candidate.backend.clone(),
        key_batch_sha256: baseline.key_batch_sha256.clone(),
        baseline_mean,
        candidate_mean,
        ratio: candidate_mean / baseline_mean,
        unit: baseline.unit.clone(),
    })
}

/// SHA-256 of `keys` joined by `\n`, lowercase hex.
#[must_use]
pub fn key_batch_fingerprint(keys: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(key.as_bytes());
    }
    hex(&hasher.finalize())
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec_pretty(value).map_err(ProbeError::serde)?;
    std::fs::write(path, payload).map_err(|err| ProbeError::io(path, err))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// Read a JSON report from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let payload = std::fs::read(path).map_err(|err| ProbeError::io(path, err))?;
    serde_json::from_slice(&payload).map_err(ProbeError::serde)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

fn hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0F)]));
    }
    out
}
