//! Benchmark binaries end to end, with a fake engine caller and real `grep`.

#![cfg(unix)]

use std::fmt::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use keyprobe_harness::ProbeError;
use keyprobe_harness::backend::{Backend, EngineCliBackend, TextSearchBackend};
use keyprobe_harness::cache::NoopCacheDropper;
use keyprobe_harness::config::SamplingConfig;
use keyprobe_harness::pipeline::run_benchmark;
use keyprobe_harness::progress::SilentProgress;
use keyprobe_harness::report::{BENCHMARK_SCHEMA_V1, BenchmarkReport, ReportComparison, read_json};

const LINES: u64 = 200;
const KEY_WIDTH: &str = "8";

/// Prints a fixed self-reported latency of 1500us.
const CALLER_SCRIPT: &str = "#!/bin/sh\necho 1500\n";
const GARBAGE_CALLER_SCRIPT: &str = "#!/bin/sh\necho 'not a number'\n";

fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// `LINES` records of the form `<8 hex chars>:<counter>`.
fn write_source(dir: &Path) -> PathBuf {
    let mut body = String::new();
    for i in 0..LINES {
        let key = (i * 2_654_435_761) % 0xFFFF_FFFF;
        writeln!(body, "{key:08X}:{i}").expect("format line");
    }
    let path = dir.join("source.txt");
    std::fs::write(&path, body).expect("write source");
    path
}

fn run(bin: &str, args: &[&std::ffi::OsStr]) -> Output {
    Command::new(bin).args(args).output().expect("spawn binary")
}

#[test]
fn engine_and_search_benches_cover_the_same_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let caller = write_executable(dir.path(), "caller.sh", CALLER_SCRIPT);
    let source = write_source(dir.path());
    let index = dir.path().join("result.btree");
    let engine_report = dir.path().join("engine.json");
    let search_report = dir.path().join("search.json");
    let comparison_path = dir.path().join("comparison.json");
    let lines = LINES.to_string();

    let engine = run(
        env!("CARGO_BIN_EXE_keyprobe-engine-bench"),
        &[
            caller.as_os_str(),
            "12".as_ref(),
            source.as_os_str(),
            lines.as_ref(),
            index.as_os_str(),
            "9".as_ref(),
            "--key-width".as_ref(),
            KEY_WIDTH.as_ref(),
            "--no-drop-caches".as_ref(),
            "--report".as_ref(),
            engine_report.as_os_str(),
        ],
    );
    let stdout = String::from_utf8_lossy(&engine.stdout);
    assert_eq!(engine.status.code(), Some(0), "case=engine_bench_exit stdout={stdout}");
    assert!(
        stdout.contains("B-tree benchmark done, result: 1.500ms"),
        "case=engine_result_line stdout={stdout}"
    );
    assert!(stdout.contains("[0/12] Got ["), "case=extraction_progress");

    let search = run(
        env!("CARGO_BIN_EXE_keyprobe-search-bench"),
        &[
            "12".as_ref(),
            source.as_os_str(),
            lines.as_ref(),
            "9".as_ref(),
            "--key-width".as_ref(),
            KEY_WIDTH.as_ref(),
            "--no-drop-caches".as_ref(),
            "--report".as_ref(),
            search_report.as_os_str(),
        ],
    );
    let stdout = String::from_utf8_lossy(&search.stdout);
    assert_eq!(search.status.code(), Some(0), "case=search_bench_exit stdout={stdout}");
    assert!(stdout.contains("Grep benchmark done, result: "), "case=search_result_line");

    let engine: BenchmarkReport = read_json(&engine_report).expect("engine report");
    let search: BenchmarkReport = read_json(&search_report).expect("search report");
    assert_eq!(engine.schema_version, BENCHMARK_SCHEMA_V1);
    assert_eq!(engine.backend, "engine-cli");
    assert_eq!(search.backend, "text-search");
    assert_eq!(engine.extracted_samples, 12);
    assert_eq!(
        engine.key_batch_sha256, search.key_batch_sha256,
        "case=same_seed_same_batch"
    );
    assert_eq!(engine.warm_up, Some(1.5));

    let compare = run(
        env!("CARGO_BIN_EXE_keyprobe-compare"),
        &[
            search_report.as_os_str(),
            engine_report.as_os_str(),
            "--output".as_ref(),
            comparison_path.as_os_str(),
        ],
    );
    assert_eq!(compare.status.code(), Some(0), "case=compare_exit");
    let comparison: ReportComparison = read_json(&comparison_path).expect("comparison");
    assert_eq!(comparison.baseline_backend, "text-search");
    assert!((comparison.candidate_mean - 1.5).abs() < 1e-9);
}

#[test]
fn different_seeds_are_not_comparable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let caller = write_executable(dir.path(), "caller.sh", CALLER_SCRIPT);
    let source = write_source(dir.path());
    let index = dir.path().join("result.btree");
    let lines = LINES.to_string();

    let mut reports = Vec::new();
    for seed in ["1", "2"] {
        let report = dir.path().join(format!("seed-{seed}.json"));
        let out = run(
            env!("CARGO_BIN_EXE_keyprobe-engine-bench"),
            &[
                caller.as_os_str(),
                "10".as_ref(),
                source.as_os_str(),
                lines.as_ref(),
                index.as_os_str(),
                seed.as_ref(),
                "--no-drop-caches".as_ref(),
                "--report".as_ref(),
                report.as_os_str(),
            ],
        );
        assert_eq!(out.status.code(), Some(0));
        reports.push(report);
    }

    let compare = run(
        env!("CARGO_BIN_EXE_keyprobe-compare"),
        &[reports[0].as_os_str(), reports[1].as_os_str()],
    );
    assert_eq!(compare.status.code(), Some(2), "case=batch_mismatch_is_usage_error");
}

#[test]
fn bad_arguments_exit_with_usage_code() {
    let out = run(
        env!("CARGO_BIN_EXE_keyprobe-search-bench"),
        &["ten".as_ref(), "source.txt".as_ref(), "100".as_ref()],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid <sampleCount>: ten"));

    let help = run(env!("CARGO_BIN_EXE_keyprobe-engine-bench"), &["--help".as_ref()]);
    assert_eq!(help.status.code(), Some(0), "case=help_is_success");
    assert!(String::from_utf8_lossy(&help.stdout).contains("USAGE:"));
}

#[test]
fn adapters_drive_real_processes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = write_source(dir.path());
    let sampling = SamplingConfig {
        seed: 4,
        sample_count: 5,
        universe_size: LINES,
        key_width: 8,
    };

    let caller = write_executable(dir.path(), "caller.sh", CALLER_SCRIPT);
    let mut engine = EngineCliBackend::new(&caller, dir.path().join("idx"));
    let report = run_benchmark(
        &sampling,
        &source,
        &mut engine,
        &mut NoopCacheDropper,
        &mut SilentProgress,
    )
    .expect("engine benchmark");
    assert_eq!(report.measurements, vec![1.5; 5], "case=micros_to_ms");

    let mut grep = TextSearchBackend::new("grep", &source);
    assert!(grep.invoke("00000000").expect("first line matches") >= 0.0);
    let err = grep.invoke("ZZZZZZZZ").expect_err("no match is a failure");
    assert!(matches!(err, ProbeError::ProcessFailed { code: Some(1), .. }));

    let garbage = write_executable(dir.path(), "garbage.sh", GARBAGE_CALLER_SCRIPT);
    let mut broken = EngineCliBackend::new(&garbage, dir.path().join("idx"));
    let err = run_benchmark(
        &sampling,
        &source,
        &mut broken,
        &mut NoopCacheDropper,
        &mut SilentProgress,
    )
    .expect_err("unparseable output aborts the run");
    assert!(matches!(err, ProbeError::BadOutput { .. }), "case=bad_output err={err}");
}
