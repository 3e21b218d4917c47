//! Sampler -> extractor -> runner, producing a [`BenchmarkReport`].

use std::path::Path;

use tracing::info;

use crate::Result;
use crate::backend::Backend;
use crate::cache::CacheDropper;
use crate::config::SamplingConfig;
use crate::extract::{Extraction, extract_keys};
use crate::progress::ProgressSink;
use crate::report::{
    BENCHMARK_SCHEMA_V1, BenchmarkReport, RngInfo, key_batch_fingerprint, unix_ms_now,
};
use crate::runner::run_benchmarks;
use crate::sampler::{sample_indices, seeded_rng};

/// Sample and extract the key batch for `sampling` from `source`.
///
/// The same generator draws the indices and then shuffles the keys.
pub fn collect_key_batch(
    sampling: &SamplingConfig,
    source: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<Extraction> {
    sampling.validate()?;
    let mut rng = seeded_rng(sampling.rng_seed());
    let indices = sample_indices(&mut rng, sampling.sample_count, sampling.universe_size)?;
    extract_keys(&mut rng, &indices, source, sampling.key_width, progress)
}

/// Run a complete benchmark of `backend` over keys sampled from `source`.
///
/// A run that completes with fewer than two measurements still yields a
/// report; its `mean` is `None`.
pub fn run_benchmark(
    sampling: &SamplingConfig,
    source: &Path,
    backend: &mut dyn Backend,
    dropper: &mut dyn CacheDropper,
    progress: &mut dyn ProgressSink,
) -> Result<BenchmarkReport> {
    let started_unix_ms = unix_ms_now();
    let extraction = collect_key_batch(sampling, source, progress)?;
    let result = run_benchmarks(&extraction.keys, backend, dropper, progress)?;

    let mut report = BenchmarkReport {
        schema_version: BENCHMARK_SCHEMA_V1.to_owned(),
        backend: backend.name().to_owned(),
        source_path: source.display().to_string(),
        seed: sampling.seed,
        rng: RngInfo::default(),
        universe_size: sampling.universe_size,
        key_width: sampling.key_width,
        requested_samples: extraction.requested,
        extracted_samples: extraction.keys.len(),
        key_batch_sha256: key_batch_fingerprint(&extraction.keys),
        unit: "ms".to_owned(),
        measurements: Vec::new(),
        warm_up: None,
        mean: None,
        latency: None,
        started_unix_ms,
        finished_unix_ms: 0,
    };
    report.fill_result(&result);
    report.finished_unix_ms = unix_ms_now();

    info!(
        backend = %report.backend,
        samples = report.extracted_samples,
        mean_ms = ?report.mean,
        "benchmark complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::ProbeError;
    use crate::backend::FnBackend;
    use crate::cache::NoopCacheDropper;
    use crate::progress::SilentProgress;

    fn numbered_source(lines: u64) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create source");
        for i in 0..lines {
            writeln!(file, "KEY{i:03}:payload").expect("write source");
        }
        file.flush().expect("flush source");
        file
    }

    fn sampling(seed: i64, sample_count: usize, universe_size: u64) -> SamplingConfig {
        SamplingConfig {
            seed,
            sample_count,
            universe_size,
            key_width: 6,
        }
    }

    #[test]
    fn test_key_batch_is_pinned_for_seed() {
        let source = numbered_source(100);
        let batch = collect_key_batch(&sampling(42, 3, 100), source.path(), &mut SilentProgress)
            .expect("collect");
        // indices [52, 54, 63], then shuffled by the same generator
        assert_eq!(batch.keys, ["KEY063", "KEY052", "KEY054"], "case=seed42_batch");
        assert_eq!(batch.lines_scanned, 64, "case=stops_after_last_sample");
    }

    #[test]
    fn test_same_seed_same_report_fingerprint() {
        let source = numbered_source(200);
        let config = sampling(7, 20, 200);
        let mut fingerprints = Vec::new();
        for _ in 0..2 {
            let mut backend = FnBackend::new("fake", |_key: &str| Ok(2.5));
            let report = run_benchmark(
                &config,
                source.path(),
                &mut backend,
                &mut NoopCacheDropper,
                &mut SilentProgress,
            )
            .expect("benchmark");
            assert_eq!(report.extracted_samples, 20);
            assert_eq!(report.measurements.len(), 20);
            assert_eq!(report.backend, "fake");
            assert_eq!(report.unit, "ms");
            assert!((report.mean_ms().expect("mean") - 2.5).abs() < 1e-9);
            fingerprints.push(report.key_batch_sha256);
        }
        assert_eq!(fingerprints[0], fingerprints[1], "case=deterministic_batch");
    }

    #[test]
    fn test_short_source_benchmarks_smaller_batch() {
        let source = numbered_source(10);
        let mut backend = FnBackend::new("fake", |_key: &str| Ok(1.0));
        let report = run_benchmark(
            &sampling(3, 50, 1_000),
            source.path(),
            &mut backend,
            &mut NoopCacheDropper,
            &mut SilentProgress,
        )
        .expect("benchmark");
        assert_eq!(report.requested_samples, 50);
        assert!(report.extracted_samples < 50, "case=shortfall_recorded");
        assert_eq!(report.measurements.len(), report.extracted_samples);
    }

    #[test]
    fn test_single_sample_has_no_mean() {
        let source = numbered_source(5);
        let mut backend = FnBackend::new("fake", |_key: &str| Ok(1.0));
        let report = run_benchmark(
            &sampling(1, 1, 5),
            source.path(),
            &mut backend,
            &mut NoopCacheDropper,
            &mut SilentProgress,
        )
        .expect("benchmark");
        assert_eq!(report.mean, None);
        assert!(matches!(report.mean_ms(), Err(ProbeError::NoData { measurements: 1 })));
    }

    #[test]
    fn test_invalid_sampling_rejected_before_io() {
        let err = collect_key_batch(
            &sampling(0, 3, 0),
            Path::new("/nonexistent/source.txt"),
            &mut SilentProgress,
        )
        .expect_err("zero universe");
        assert!(err.is_validation(), "case=validation_first err={err}");
    }
}
