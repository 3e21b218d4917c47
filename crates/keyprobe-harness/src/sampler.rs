//! Seeded selection of line indices.
//!
//! Sampling never looks at the source file: the index set depends only on
//! `(seed, count, universe_size)`. Two processes given the same triple draw
//! the same indices, which is what lets separate backend runs be compared on
//! an identical key batch.
//!
//! The generator is an owned [`StdRng`] that callers thread through sampling
//! and then extraction, so the post-extraction shuffle continues the same
//! seed lineage.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{ProbeError, Result};

/// Name of the generator algorithm, recorded in reports.
pub const RNG_ALGORITHM: &str = "rand::rngs::StdRng (ChaCha12)";
/// Version of the `rand` API the sequence is pinned to.
pub const RNG_VERSION: &str = "rand-0.8";

/// Build the generator for a benchmark run.
#[must_use]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Draw `count` indices uniformly from `[0, universe_size)` with replacement,
/// sorted ascending.
pub fn sample_indices<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    universe_size: u64,
) -> Result<Vec<u64>> {
    if universe_size == 0 {
        return Err(ProbeError::invalid("universe size must be >= 1"));
    }

    let mut indices: Vec<u64> = (0..count).map(|_| rng.gen_range(0..universe_size)).collect();
    indices.sort_unstable();

    debug!(
        count,
        universe_size,
        first = ?indices.first(),
        last = ?indices.last(),
        "sample indices drawn"
    );
    Ok(indices)
}

/// One-shot form of [`sample_indices`] with a fresh generator.
pub fn generate_sample_indices(seed: u64, count: usize, universe_size: u64) -> Result<Vec<u64>> {
    sample_indices(&mut seeded_rng(seed), count, universe_size)
}
