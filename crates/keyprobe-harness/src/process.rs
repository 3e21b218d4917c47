//! Synchronous external-process execution.
//!
//! Every call runs to completion; no timeout is applied, so a hung child
//! hangs the harness.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::{ProbeError, Result};

/// Outcome of one finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecution {
    pub program: String,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

impl CommandExecution {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into [`ProbeError::ProcessFailed`].
    pub fn require_success(self) -> Result<Self> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(ProbeError::ProcessFailed {
                program: self.program,
                code: self.exit_code,
                stderr: self.stderr.trim().to_owned(),
            })
        }
    }
}

/// Render a program path for logs and error messages.
#[must_use]
pub fn program_label(program: &Path) -> String {
    program.display().to_string()
}

/// Run `command` and capture both output streams.
pub fn run_captured(command: &mut Command) -> Result<CommandExecution> {
    run(command, true)
}

/// Run `command` with stdout discarded; stderr is still captured.
pub fn run_quiet(command: &mut Command) -> Result<CommandExecution> {
    run(command, false)
}

fn run(command: &mut Command, capture_stdout: bool) -> Result<CommandExecution> {
    let program = command.get_program().to_string_lossy().into_owned();
    command.stdin(Stdio::null()).stderr(Stdio::piped());
    if capture_stdout {
        command.stdout(Stdio::piped());
    } else {
        command.stdout(Stdio::null());
    }

    let start = Instant::now();
    let output = command.output().map_err(|source| ProbeError::Spawn {
        program: program.clone(),
        source,
    })?;
    let elapsed = start.elapsed();

    let execution = CommandExecution {
        program,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed,
    };
    debug!(
        program = %execution.program,
        exit_code = ?execution.exit_code,
        elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        "external command finished"
    );
    Ok(execution)
}

/// Build a `sh -c <script>` command, optionally through `sudo`.
#[must_use]
pub fn shell_command(script: &str, use_sudo: bool) -> Command {
    let mut command = if use_sudo {
        let mut sudo = Command::new("sudo");
        sudo.arg("sh");
        sudo
    } else {
        Command::new("sh")
    };
    command.arg("-c").arg(script);
    command
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let execution = run_captured(&mut shell_command("echo 1234; exit 0", false)).unwrap();
        assert!(execution.succeeded());
        assert_eq!(execution.stdout.trim(), "1234");
    }

    #[test]
    fn nonzero_exit_becomes_process_failed() {
        let execution =
            run_captured(&mut shell_command("echo oops >&2; exit 3", false)).unwrap();
        assert_eq!(execution.exit_code, Some(3));
        let err = execution.require_success().expect_err("exit 3 must fail");
        match err {
            ProbeError::ProcessFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run_quiet(&mut Command::new("/definitely/not/a/real/binary"))
            .expect_err("spawn must fail");
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
