//! Benchmark and correctness harness for external key-lookup engines.
//!
//! Two independent pipelines live here:
//!
//! - **Benchmarking**: [`sampler`] draws a seeded, sorted set of line indices,
//!   [`extract`] pulls the matching keys out of the source file in one
//!   forward pass and shuffles them, and [`runner`] drops OS caches and times
//!   each lookup through a [`backend::Backend`]. [`pipeline`] wires the three
//!   together and produces a [`report::BenchmarkReport`].
//! - **Verification**: [`verifier`] builds an index with the engine once and
//!   then queries every key of the source file against it, accumulating a
//!   single verdict.
//!
//! All work is strictly sequential. Nothing here spawns threads.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod verifier;

pub use keyprobe_error::{EXIT_FAILURE, EXIT_USAGE, ProbeError, Result};

/// Default width of a key, in characters (a hex SHA-1 digest).
pub const DEFAULT_KEY_WIDTH: usize = 40;

/// Default seed used when none is given on the command line.
pub const DEFAULT_SEED: i64 = 0;
