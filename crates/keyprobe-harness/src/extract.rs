//! Single-pass key extraction from the source file.
//!
//! The source is read forward exactly once with a reused line buffer, so
//! memory stays constant in the file size and linear in the sample count.
//! Keys are captured in file order and then shuffled with the caller's
//! generator so the benchmark does not walk the index in ascending order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::progress::{ProgressEvent, ProgressSink};
use crate::{ProbeError, Result};

/// Keys pulled from the source file for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Shuffled key batch.
    pub keys: Vec<String>,
    /// Number of indices the sampler asked for.
    pub requested: usize,
    /// Lines read before extraction stopped.
    pub lines_scanned: u64,
}

impl Extraction {
    /// Requested samples that pointed past the end of the file.
    #[must_use]
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.keys.len())
    }
}

/// Strip the line terminator and keep at most `key_width` characters.
#[must_use]
pub fn key_prefix(line: &str, key_width: usize) -> &str {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.char_indices().nth(key_width) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}

/// Capture the keys at `sorted_indices` from `reader`, in file order.
///
/// Repeated indices yield the same key repeatedly. Reading stops as soon as
/// every index is consumed or the input ends; indices past the end are
/// simply not captured.
pub fn collect_keys<B: BufRead>(
    reader: B,
    sorted_indices: &[u64],
    key_width: usize,
    progress: &mut dyn ProgressSink,
) -> Result<(Vec<String>, u64)> {
    validate_request(sorted_indices, key_width)?;
    scan(reader, Path::new("<reader>"), sorted_indices, key_width, progress)
}

fn scan<B: BufRead>(
    mut reader: B,
    origin: &Path,
    sorted_indices: &[u64],
    key_width: usize,
    progress: &mut dyn ProgressSink,
) -> Result<(Vec<String>, u64)> {
    let total = sorted_indices.len();
    let mut keys = Vec::with_capacity(total);
    let mut pending = sorted_indices.iter().copied().peekable();
    let mut buf = Vec::with_capacity(128);
    let mut line_no: u64 = 0;

    while let Some(&next) = pending.peek() {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| ProbeError::io(origin, err))?;
        if read == 0 {
            break;
        }

        if line_no == next {
            let line = String::from_utf8_lossy(&buf);
            let key = key_prefix(&line, key_width);
            while pending.next_if_eq(&line_no).is_some() {
                progress.emit(ProgressEvent::KeyCollected {
                    index: keys.len(),
                    total,
                    line: line_no,
                    key,
                });
                keys.push(key.to_owned());
            }
        }
        line_no += 1;
    }

    Ok((keys, line_no))
}

/// Extract the sampled keys from `source` and shuffle them with `rng`.
pub fn extract_keys<R: Rng + ?Sized>(
    rng: &mut R,
    sorted_indices: &[u64],
    source: &Path,
    key_width: usize,
    progress: &mut dyn ProgressSink,
) -> Result<Extraction> {
    validate_request(sorted_indices, key_width)?;

    let file = File::open(source).map_err(|err| ProbeError::io(source, err))?;
    let (mut keys, lines_scanned) =
        scan(BufReader::new(file), source, sorted_indices, key_width, progress)?;

    keys.shuffle(rng);

    let extraction = Extraction {
        keys,
        requested: sorted_indices.len(),
        lines_scanned,
    };
    if extraction.shortfall() > 0 {
        warn!(
            source = %source.display(),
            requested = extraction.requested,
            extracted = extraction.keys.len(),
            lines_scanned,
            "source has fewer lines than the sampled universe; benchmarking a smaller batch"
        );
    }
    info!(
        source = %source.display(),
        extracted = extraction.keys.len(),
        lines_scanned,
        "key batch extracted"
    );
    Ok(extraction)
}

fn validate_request(sorted_indices: &[u64], key_width: usize) -> Result<()> {
    if key_width == 0 {
        return Err(ProbeError::invalid("key width must be >= 1"));
    }
    if sorted_indices.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(ProbeError::invalid("sample indices must be sorted ascending"));
    }
    Ok(())
}
