//! Cold-cache benchmark loop and aggregation.
//!
//! For every key, in order: drop caches, invoke the backend, record the
//! elapsed time, report progress. Nothing overlaps. The first measurement
//! absorbs process start-up and cold engine state and is excluded from the
//! aggregate.
//!
//! A failing drop or backend call aborts the whole run and the partial
//! measurements are discarded.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cache::CacheDropper;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::{ProbeError, Result};

/// Per-key measurements of one run, aligned with the key batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Milliseconds, including the warm-up entry at index 0.
    pub measurements_ms: Vec<f64>,
}

impl BenchmarkResult {
    /// The discarded warm-up measurement, if any.
    #[must_use]
    pub fn warm_up_ms(&self) -> Option<f64> {
        self.measurements_ms.first().copied()
    }

    /// Measurements that count towards the aggregate.
    #[must_use]
    pub fn retained(&self) -> &[f64] {
        self.measurements_ms.get(1..).unwrap_or(&[])
    }

    /// Mean of every measurement except the first.
    pub fn aggregate_ms(&self) -> Result<f64> {
        aggregate(&self.measurements_ms)
    }

    #[must_use]
    pub fn summary(&self) -> Option<LatencySummary> {
        LatencySummary::from_samples(self.retained())
    }
}

/// Distribution of the retained measurements, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencySummary {
    /// Nearest-rank percentiles; `None` for an empty slice.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            min: sorted[0],
            p50: percentile(&sorted, 50),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Arithmetic mean of `measurements[1..]`.
///
/// Fewer than two measurements leave nothing to average and yield
/// [`ProbeError::NoData`].
pub fn aggregate(measurements: &[f64]) -> Result<f64> {
    let retained = measurements.get(1..).unwrap_or(&[]);
    if retained.is_empty() {
        return Err(ProbeError::NoData {
            measurements: measurements.len(),
        });
    }
    Ok(retained.iter().sum::<f64>() / retained.len() as f64)
}

/// Time `backend` on every key in `keys`, sequentially.
pub fn run_benchmarks(
    keys: &[String],
    backend: &mut dyn Backend,
    dropper: &mut dyn CacheDropper,
    progress: &mut dyn ProgressSink,
) -> Result<BenchmarkResult> {
    let total = keys.len();
    let mut measurements_ms = Vec::with_capacity(total);

    info!(backend = backend.name(), total, "benchmark run starting");
    for (index, key) in keys.iter().enumerate() {
        dropper.drop_caches()?;
        let elapsed_ms = backend.invoke(key)?;
        measurements_ms.push(elapsed_ms);
        debug!(index, key = key.as_str(), elapsed_ms, "measured");
        progress.emit(ProgressEvent::Measured {
            index,
            total,
            key: key.as_str(),
            elapsed_ms,
        });
    }
    info!(backend = backend.name(), total, "benchmark run finished");

    Ok(BenchmarkResult { measurements_ms })
}

fn percentile(sorted: &[f64], pct: usize) -> f64 {
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1]
}
