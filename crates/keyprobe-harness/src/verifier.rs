//! Exhaustive correctness verification of a built index.
//!
//! `Preparing -> Checking -> {Success, Failed}`. The engine builds an index
//! from the source file once; then every line of that same file is read,
//! its key derived, and the key queried against the index. A missing key is
//! recorded and the scan continues: the verdict is only known once the last
//! line has been checked.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::VerifierConfig;
use crate::engine::{BuildOutcome, LookupEngine};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::{ProbeError, Result};

/// Where the verifier is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierState {
    Preparing,
    Checking,
    Success,
    Failed,
}

impl VerifierState {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Preparing, Self::Checking | Self::Failed)
                | (Self::Checking, Self::Success | Self::Failed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Final outcome of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Success,
    /// At least one key was not found.
    Failed,
    /// The index could not be built; nothing was checked.
    BuildFailed,
}

/// Accumulated result of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub kind: VerdictKind,
    pub index_path: PathBuf,
    /// Queries issued, one per non-blank source line.
    pub lines_checked: u64,
    /// Every failure, regardless of the reporting limit.
    pub failure_count: u64,
    /// Failing keys in file order, capped by the reporting limit.
    pub failing_keys: Vec<String>,
    /// Failures counted but not listed in `failing_keys`.
    pub failures_truncated: u64,
    pub build_diagnostics: Option<String>,
}

impl VerificationVerdict {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == VerdictKind::Success
    }
}

/// Derive the lookup key of a record: everything before the first
/// `delimiter`, without the line terminator.
#[must_use]
pub fn derive_key(line: &str, delimiter: char) -> &str {
    let line = line.trim_end_matches(['\n', '\r']);
    line.split_once(delimiter).map_or(line, |(key, _)| key)
}

/// Drives one verification run against a [`LookupEngine`].
pub struct Verifier<E> {
    engine: E,
    config: VerifierConfig,
    state: VerifierState,
}

impl<E: LookupEngine> Verifier<E> {
    pub fn new(engine: E, config: VerifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            state: VerifierState::Preparing,
        })
    }

    #[must_use]
    pub fn state(&self) -> VerifierState {
        self.state
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Build the index under `working_dir`, then check every key of `source`.
    ///
    /// Only harness-level failures (unreadable source, engine cannot be
    /// spawned, working directory cannot be created) are errors; missing
    /// keys and build failures are reported in the verdict.
    pub fn run(
        &mut self,
        source: &Path,
        working_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<VerificationVerdict> {
        if self.state != VerifierState::Preparing {
            return Err(ProbeError::internal(format!(
                "verifier already ran (state {:?})",
                self.state
            )));
        }

        std::fs::create_dir_all(working_dir).map_err(|err| ProbeError::io(working_dir, err))?;
        let index_path = self.config.index_path(working_dir);

        match self.engine.prepare(source, working_dir, &index_path)? {
            BuildOutcome::Built => self.transition(VerifierState::Checking)?,
            BuildOutcome::Failed {
                exit_code,
                diagnostics,
            } => {
                self.transition(VerifierState::Failed)?;
                error!(?exit_code, diagnostics = %diagnostics, "preparing failed");
                return Ok(VerificationVerdict {
                    kind: VerdictKind::BuildFailed,
                    index_path,
                    lines_checked: 0,
                    failure_count: 0,
                    failing_keys: Vec::new(),
                    failures_truncated: 0,
                    build_diagnostics: Some(diagnostics),
                });
            }
        }

        let file = File::open(source).map_err(|err| ProbeError::io(source, err))?;
        let verdict = self.check(BufReader::new(file), source, index_path, progress)?;

        let next = if verdict.is_success() {
            VerifierState::Success
        } else {
            VerifierState::Failed
        };
        self.transition(next)?;
        info!(
            kind = ?verdict.kind,
            lines_checked = verdict.lines_checked,
            failure_count = verdict.failure_count,
            "verification finished"
        );
        Ok(verdict)
    }

    fn check<B: BufRead>(
        &mut self,
        mut reader: B,
        source: &Path,
        index_path: PathBuf,
        progress: &mut dyn ProgressSink,
    ) -> Result<VerificationVerdict> {
        let limit = self.config.failure_report_limit;
        let mut failing_keys = Vec::new();
        let mut failure_count: u64 = 0;
        let mut lines_checked: u64 = 0;
        let mut line_no: u64 = 0;
        let mut buf = Vec::with_capacity(128);

        info!(source = %source.display(), index = %index_path.display(), "checking every key");
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|err| ProbeError::io(source, err))?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let line = String::from_utf8_lossy(&buf);
            if line.trim_end_matches(['\n', '\r']).is_empty() {
                continue;
            }
            let key = derive_key(&line, self.config.key_delimiter);

            lines_checked += 1;
            if lines_checked % self.config.progress_every == 0 {
                progress.emit(ProgressEvent::LinesChecked {
                    lines: lines_checked,
                });
            }

            if !self.engine.query(&index_path, key)?.is_found() {
                failure_count += 1;
                progress.emit(ProgressEvent::KeyMissing { line: line_no, key });
                if limit.is_none_or(|cap| failing_keys.len() < cap) {
                    failing_keys.push(key.to_owned());
                }
            }
        }

        let failures_truncated = failure_count - failing_keys.len() as u64;
        Ok(VerificationVerdict {
            kind: if failure_count == 0 {
                VerdictKind::Success
            } else {
                VerdictKind::Failed
            },
            index_path,
            lines_checked,
            failure_count,
            failing_keys,
            failures_truncated,
            build_diagnostics: None,
        })
    }

    fn transition(&mut self, next: VerifierState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ProbeError::internal(format!(
                "invalid verifier transition {:?} -> {next:?}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::QueryOutcome;
    use crate::progress::SilentProgress;

    /// Engine double that "finds" every key except those in `missing`.
    #[derive(Default)]
    struct FakeEngine {
        build_fails: bool,
        missing: BTreeSet<String>,
        queried: Vec<String>,
        prepared: Vec<PathBuf>,
    }

    impl LookupEngine for FakeEngine {
        fn prepare(&mut self, _source: &Path, _wd: &Path, output: &Path) -> Result<BuildOutcome> {
            self.prepared.push(output.to_path_buf());
            if self.build_fails {
                Ok(BuildOutcome::Failed {
                    exit_code: Some(2),
                    diagnostics: "disk full".to_owned(),
                })
            } else {
                Ok(BuildOutcome::Built)
            }
        }

        fn query(&mut self, _index: &Path, key: &str) -> Result<QueryOutcome> {
            self.queried.push(key.to_owned());
            if self.missing.contains(key) {
                Ok(QueryOutcome::NotFound { exit_code: Some(0) })
            } else {
                Ok(QueryOutcome::Found)
            }
        }
    }

    fn write_source(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("source.txt");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_derive_key() {
        assert_eq!(derive_key("ABCD:12\n", ':'), "ABCD");
        assert_eq!(derive_key("ABCD\r\n", ':'), "ABCD");
        assert_eq!(derive_key("AB:CD:EF", ':'), "AB");
        assert_eq!(derive_key(":x", ':'), "");
    }

    #[test]
    fn test_missing_key_does_not_stop_scan() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "AAAA:1\nBBBB:2\nCCCC:3\n");
        let engine = FakeEngine {
            missing: BTreeSet::from(["BBBB".to_owned()]),
            ..FakeEngine::default()
        };
        let mut verifier = Verifier::new(engine, VerifierConfig::default()).unwrap();
        let verdict = verifier
            .run(&source, &dir.path().join("wd"), &mut SilentProgress)
            .unwrap();

        assert_eq!(verdict.kind, VerdictKind::Failed, "case=one_missing");
        assert_eq!(verdict.failing_keys, vec!["BBBB"]);
        assert_eq!(verdict.lines_checked, 3);
        assert_eq!(verifier.state(), VerifierState::Failed);
        assert_eq!(
            verifier.into_engine().queried,
            vec!["AAAA", "BBBB", "CCCC"],
            "case=every_line_queried"
        );
    }

    #[test]
    fn test_all_found_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "AAAA:1\nBBBB:2\n");
        let wd = dir.path().join("nested/wd");
        let mut verifier = Verifier::new(FakeEngine::default(), VerifierConfig::default()).unwrap();
        let verdict = verifier.run(&source, &wd, &mut SilentProgress).unwrap();

        assert!(verdict.is_success());
        assert_eq!(verdict.failure_count, 0);
        assert_eq!(verdict.index_path, wd.join("result.btree"));
        assert!(wd.is_dir(), "case=working_dir_created");
        assert_eq!(verifier.state(), VerifierState::Success);
    }

    #[test]
    fn test_build_failure_skips_checking() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "AAAA:1\n");
        let engine = FakeEngine {
            build_fails: true,
            ..FakeEngine::default()
        };
        let mut verifier = Verifier::new(engine, VerifierConfig::default()).unwrap();
        let verdict = verifier
            .run(&source, dir.path(), &mut SilentProgress)
            .unwrap();

        assert_eq!(verdict.kind, VerdictKind::BuildFailed);
        assert_eq!(verdict.build_diagnostics.as_deref(), Some("disk full"));
        assert!(!verdict.is_success());
        assert_eq!(verifier.state(), VerifierState::Failed);
        assert!(verifier.into_engine().queried.is_empty(), "case=no_queries");
    }

    #[test]
    fn test_failure_limit_counts_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..10).map(|i| format!("K{i}:x\n")).collect();
        let source = write_source(dir.path(), &body);
        let engine = FakeEngine {
            missing: (0..10).step_by(2).map(|i| format!("K{i}")).collect(),
            ..FakeEngine::default()
        };
        let config = VerifierConfig {
            failure_report_limit: Some(2),
            ..VerifierConfig::default()
        };
        let mut verifier = Verifier::new(engine, config).unwrap();
        let verdict = verifier
            .run(&source, dir.path(), &mut SilentProgress)
            .unwrap();

        assert_eq!(verdict.failure_count, 5);
        assert_eq!(verdict.failing_keys, vec!["K0", "K2"]);
        assert_eq!(verdict.failures_truncated, 3);
        assert_eq!(verdict.lines_checked, 10);
    }

    #[test]
    fn test_progress_cadence_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "A:1\nB:2\n\nC:3\nD:4\n\n");
        let config = VerifierConfig {
            progress_every: 2,
            ..VerifierConfig::default()
        };
        let mut checkpoints = Vec::new();
        let mut sink = |event: ProgressEvent<'_>| {
            if let ProgressEvent::LinesChecked { lines } = event {
                checkpoints.push(lines);
            }
        };
        let mut verifier = Verifier::new(FakeEngine::default(), config).unwrap();
        let verdict = verifier.run(&source, dir.path(), &mut sink).unwrap();

        assert_eq!(verdict.lines_checked, 4, "case=blank_lines_skipped");
        assert_eq!(checkpoints, vec![2, 4]);
    }

    #[test]
    fn test_records_with_empty_keys_are_still_queried() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), ":x\n");
        let engine = FakeEngine {
            missing: BTreeSet::from([String::new()]),
            ..FakeEngine::default()
        };
        let mut verifier = Verifier::new(engine, VerifierConfig::default()).unwrap();
        let verdict = verifier
            .run(&source, dir.path(), &mut SilentProgress)
            .unwrap();

        assert_eq!(verdict.kind, VerdictKind::Failed, "case=empty_key_not_found");
        assert_eq!(verdict.lines_checked, 1);
        assert_eq!(verdict.failure_count, 1);
    }

    #[test]
    fn test_whitespace_keys_count_as_records() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), ":payload\n   :x\r\n\r\n");
        let engine = FakeEngine {
            missing: BTreeSet::from([String::new(), "   ".to_owned()]),
            ..FakeEngine::default()
        };
        let mut verifier = Verifier::new(engine, VerifierConfig::default()).unwrap();
        let verdict = verifier
            .run(&source, dir.path(), &mut SilentProgress)
            .unwrap();

        assert_eq!(verdict.kind, VerdictKind::Failed);
        assert_eq!(verdict.lines_checked, 2, "case=only_terminator_lines_skipped");
        assert_eq!(verdict.failing_keys, vec!["", "   "]);
        assert_eq!(verifier.into_engine().queried, vec!["", "   "]);
    }

    #[test]
    fn test_verifier_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "A:1\n");
        let mut verifier = Verifier::new(FakeEngine::default(), VerifierConfig::default()).unwrap();
        verifier.run(&source, dir.path(), &mut SilentProgress).unwrap();
        let err = verifier
            .run(&source, dir.path(), &mut SilentProgress)
            .expect_err("second run must fail");
        assert!(matches!(err, ProbeError::Internal(_)));
    }

    #[test]
    fn test_state_transitions() {
        use VerifierState::*;
        assert!(Preparing.can_transition_to(Checking));
        assert!(Preparing.can_transition_to(Failed));
        assert!(!Preparing.can_transition_to(Success));
        assert!(Checking.can_transition_to(Success));
        assert!(!Success.can_transition_to(Checking));
        assert!(Failed.is_terminal() && Success.is_terminal());
    }
}
