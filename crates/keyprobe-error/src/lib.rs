//! Error taxonomy for the keyprobe benchmark and verification harness.
//!
//! Validation errors are raised before any file or process I/O happens.
//! Everything else is a runtime failure of the harness or of an external
//! program it drives.

use std::path::{Path, PathBuf};

/// Process exit code for a run that completed but failed.
pub const EXIT_FAILURE: u8 = 1;
/// Process exit code for bad arguments or configuration.
pub const EXIT_USAGE: u8 = 2;

/// Primary error type for the harness.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Bad seed, count, universe size, key width or option value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O failed on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran but did not report success.
    #[error("`{program}` exited abnormally (code {code:?}): {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A backend printed something that is not a timing value.
    #[error("unparseable backend output from `{program}`: {output:?}")]
    BadOutput { program: String, output: String },

    /// Aggregation was asked for a mean over zero retained measurements.
    #[error("no data: {measurements} measurement(s) leave nothing after the warm-up is discarded")]
    NoData { measurements: usize },

    /// Report encode/decode failure.
    #[error("report serialization failed: {0}")]
    Serde(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Render any serializer error into [`ProbeError::Serde`].
    pub fn serde(err: impl std::fmt::Display) -> Self {
        Self::Serde(err.to_string())
    }

    /// Whether this error was raised by input validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Exit code a binary should terminate with for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.is_validation() {
            EXIT_USAGE
        } else {
            EXIT_FAILURE
        }
    }
}

/// Result alias used throughout the harness.
pub type Result<T> = std::result::Result<T, ProbeError>;
