//! Progress notifications for long scans and benchmark loops.

use tracing::{debug, info, warn};

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent<'a> {
    /// A sampled line was captured during extraction.
    KeyCollected {
        index: usize,
        total: usize,
        line: u64,
        key: &'a str,
    },
    /// A benchmark measurement completed.
    Measured {
        index: usize,
        total: usize,
        key: &'a str,
        elapsed_ms: f64,
    },
    /// The verifier has checked `lines` lines so far.
    LinesChecked { lines: u64 },
    /// The verifier's query for `key` did not report "found".
    KeyMissing { line: u64, key: &'a str },
}

/// Receiver of [`ProgressEvent`]s.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent<'_>),
{
    fn emit(&mut self, event: ProgressEvent<'_>) {
        self(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&mut self, _event: ProgressEvent<'_>) {}
}

/// Prints operator-facing progress lines to stdout and mirrors them to
/// `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::KeyCollected {
                index,
                total,
                line,
                key,
            } => {
                println!("[{index}/{total}] Got [{line}]: {key}");
                debug!(index, total, line, key, "key collected");
            }
            ProgressEvent::Measured {
                index,
                total,
                key,
                elapsed_ms,
            } => {
                println!("[{index}/{total}] Benchmarking {key}");
                debug!(index, total, key, elapsed_ms, "measurement recorded");
            }
            ProgressEvent::LinesChecked { lines } => {
                println!("{lines}");
                info!(lines, "verification progress");
            }
            ProgressEvent::KeyMissing { line, key } => {
                println!("Key not found: {key}");
                warn!(line, key, "key not found in built index");
            }
        }
    }
}
