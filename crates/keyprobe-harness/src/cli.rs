//! Argument parsing for the harness binaries.
//!
//! Positional arguments come first in the documented order; `--flag value`
//! options may follow (or be interleaved). Parsers never print: `-h/--help`
//! yields [`CliAction::Help`] and the binary prints the matching usage text.

use std::path::PathBuf;

use crate::DEFAULT_SEED;
use crate::config::{CacheDropConfig, SamplingConfig, VerifierConfig};

pub const ENGINE_BENCH_USAGE: &str = "\
keyprobe-engine-bench: cold-cache latency of the lookup engine's point query

USAGE:
    keyprobe-engine-bench <engineCaller> <sampleCount> <sourceFile> <universeSize> <indexFile> [seed] [OPTIONS]

ARGS:
    <engineCaller>     Program invoked as `<engineCaller> <key> <indexFile>`;
                       prints the lookup time in microseconds
    <sampleCount>      Number of keys to sample
    <sourceFile>       Text file with one record per line
    <universeSize>     Sample line indices from [0, universeSize)
    <indexFile>        Index passed to every engine call
    [seed]             Sampler seed (default: 0)

OPTIONS:
    --key-width <N>           Key prefix width in characters (default: 40)
    --no-drop-caches          Do not drop OS caches before each measurement
    --drop-caches-cmd <CMD>   Shell command that drops caches (run via sudo sh -c)
    --report <PATH>           Write a JSON benchmark report
    -h, --help                Show this help
";

pub const SEARCH_BENCH_USAGE: &str = "\
keyprobe-search-bench: cold-cache latency of a linear text search baseline

USAGE:
    keyprobe-search-bench <sampleCount> <sourceFile> <universeSize> [seed] [OPTIONS]

ARGS:
    <sampleCount>      Number of keys to sample
    <sourceFile>       Text file with one record per line
    <universeSize>     Sample line indices from [0, universeSize)
    [seed]             Sampler seed (default: 0)

OPTIONS:
    --search-bin <PATH>       Search program, invoked as `<bin> -m 1 ^<key> <sourceFile>` (default: grep)
    --key-width <N>           Key prefix width in characters (default: 40)
    --no-drop-caches          Do not drop OS caches before each measurement
    --drop-caches-cmd <CMD>   Shell command that drops caches (run via sudo sh -c)
    --report <PATH>           Write a JSON benchmark report
    -h, --help                Show this help
";

pub const VERIFY_USAGE: &str = "\
keyprobe-verify: build an index with the engine and query every key of the source

USAGE:
    keyprobe-verify <engineBinary> <sourceFile> <workingDirectory> [OPTIONS]

OPTIONS:
    --progress-every <N>          Print progress every N lines (default: 10000)
    --max-reported-failures <N>   Keep at most N failing keys in the report (default: all)
    --index-name <NAME>           Index file name inside the working directory (default: result.btree)
    --report <PATH>               Write a JSON verification report
    -h, --help                    Show this help
";

pub const COMPARE_USAGE: &str = "\
keyprobe-compare: compare two benchmark reports taken over the same key batch

USAGE:
    keyprobe-compare <baselineReport> <candidateReport> [OPTIONS]

OPTIONS:
    --output <PATH>    Write the comparison as JSON
    -h, --help         Show this help
";

/// What a parsed command line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction<T> {
    Run(T),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBenchArgs {
    pub engine_caller: PathBuf,
    pub source: PathBuf,
    pub index_file: PathBuf,
    pub sampling: SamplingConfig,
    pub cache: CacheDropConfig,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBenchArgs {
    pub search_bin: PathBuf,
    pub source: PathBuf,
    pub sampling: SamplingConfig,
    pub cache: CacheDropConfig,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyArgs {
    pub engine: PathBuf,
    pub source: PathBuf,
    pub working_dir: PathBuf,
    pub verifier: VerifierConfig,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareArgs {
    pub baseline: PathBuf,
    pub candidate: PathBuf,
    pub output: Option<PathBuf>,
}

/// Options shared by both benchmark binaries.
#[derive(Debug, Default)]
struct BenchOptions {
    key_width: Option<usize>,
    no_drop_caches: bool,
    drop_caches_cmd: Option<String>,
    report: Option<PathBuf>,
    search_bin: Option<PathBuf>,
}

impl BenchOptions {
    fn cache_config(&self) -> CacheDropConfig {
        let mut cache = CacheDropConfig::default().with_env_overrides();
        if let Some(command) = &self.drop_caches_cmd {
            command.clone_into(&mut cache.command);
        }
        if self.no_drop_caches {
            cache.enabled = false;
        }
        cache
    }

    fn sampling(&self, sample_count: usize, universe_size: u64, seed: i64) -> SamplingConfig {
        let mut sampling = SamplingConfig {
            seed,
            sample_count,
            universe_size,
            ..SamplingConfig::default()
        };
        if let Some(width) = self.key_width {
            sampling.key_width = width;
        }
        sampling
    }
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str, String> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("invalid {what}: {value}"))
}

/// Split positionals from bench options.
fn split_bench_args(
    args: &[String],
    allow_search_bin: bool,
) -> Result<Option<(Vec<&str>, BenchOptions)>, String> {
    let mut positional = Vec::new();
    let mut options = BenchOptions::default();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--key-width" => {
                let value = take_value(args, &mut index, "--key-width")?;
                options.key_width = Some(parse_number(value, "--key-width value")?);
            }
            "--no-drop-caches" => options.no_drop_caches = true,
            "--drop-caches-cmd" => {
                let value = take_value(args, &mut index, "--drop-caches-cmd")?;
                options.drop_caches_cmd = Some(value.to_owned());
            }
            "--report" => {
                options.report = Some(PathBuf::from(take_value(args, &mut index, "--report")?));
            }
            "--search-bin" if allow_search_bin => {
                options.search_bin =
                    Some(PathBuf::from(take_value(args, &mut index, "--search-bin")?));
            }
            "-h" | "--help" => return Ok(None),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            value => positional.push(value),
        }
        index += 1;
    }

    Ok(Some((positional, options)))
}

fn optional_seed(positional: &[&str], at: usize) -> Result<i64, String> {
    positional
        .get(at)
        .map_or(Ok(DEFAULT_SEED), |value| parse_number(value, "[seed]"))
}

pub fn parse_engine_bench_args(args: &[String]) -> Result<CliAction<EngineBenchArgs>, String> {
    let Some((positional, options)) = split_bench_args(args, false)? else {
        return Ok(CliAction::Help);
    };
    if !(5..=6).contains(&positional.len()) {
        return Err(format!(
            "expected 5 or 6 positional arguments, got {}",
            positional.len()
        ));
    }

    let sample_count = parse_number(positional[1], "<sampleCount>")?;
    let universe_size = parse_number(positional[3], "<universeSize>")?;
    let seed = optional_seed(&positional, 5)?;

    Ok(CliAction::Run(EngineBenchArgs {
        engine_caller: PathBuf::from(positional[0]),
        source: PathBuf::from(positional[2]),
        index_file: PathBuf::from(positional[4]),
        sampling: options.sampling(sample_count, universe_size, seed),
        cache: options.cache_config(),
        report: options.report,
    }))
}

pub fn parse_search_bench_args(args: &[String]) -> Result<CliAction<SearchBenchArgs>, String> {
    let Some((positional, options)) = split_bench_args(args, true)? else {
        return Ok(CliAction::Help);
    };
    if !(3..=4).contains(&positional.len()) {
        return Err(format!(
            "expected 3 or 4 positional arguments, got {}",
            positional.len()
        ));
    }

    let sample_count = parse_number(positional[0], "<sampleCount>")?;
    let universe_size = parse_number(positional[2], "<universeSize>")?;
    let seed = optional_seed(&positional, 3)?;

    Ok(CliAction::Run(SearchBenchArgs {
        search_bin: options
            .search_bin
            .clone()
            .unwrap_or_else(|| PathBuf::from("grep")),
        source: PathBuf::from(positional[1]),
        sampling: options.sampling(sample_count, universe_size, seed),
        cache: options.cache_config(),
        report: options.report,
    }))
}

pub fn parse_verify_args(args: &[String]) -> Result<CliAction<VerifyArgs>, String> {
    let mut positional = Vec::new();
    let mut verifier = VerifierConfig::default();
    let mut report = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--progress-every" => {
                let value = take_value(args, &mut index, "--progress-every")?;
                verifier.progress_every = parse_number(value, "--progress-every value")?;
            }
            "--max-reported-failures" => {
                let value = take_value(args, &mut index, "--max-reported-failures")?;
                verifier.failure_report_limit =
                    Some(parse_number(value, "--max-reported-failures value")?);
            }
            "--index-name" => {
                take_value(args, &mut index, "--index-name")?
                    .clone_into(&mut verifier.index_file_name);
            }
            "--report" => {
                report = Some(PathBuf::from(take_value(args, &mut index, "--report")?));
            }
            "-h" | "--help" => return Ok(CliAction::Help),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            value => positional.push(value),
        }
        index += 1;
    }

    let [engine, source, working_dir] = positional.as_slice() else {
        return Err(format!(
            "expected 3 positional arguments, got {}",
            positional.len()
        ));
    };

    Ok(CliAction::Run(VerifyArgs {
        engine: PathBuf::from(engine),
        source: PathBuf::from(source),
        working_dir: PathBuf::from(working_dir),
        verifier,
        report,
    }))
}

pub fn parse_compare_args(args: &[String]) -> Result<CliAction<CompareArgs>, String> {
    let mut positional = Vec::new();
    let mut output = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--output" => {
                output = Some(PathBuf::from(take_value(args, &mut index, "--output")?));
            }
            "-h" | "--help" => return Ok(CliAction::Help),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            value => positional.push(value),
        }
        index += 1;
    }

    let [baseline, candidate] = positional.as_slice() else {
        return Err(format!(
            "expected 2 positional arguments, got {}",
            positional.len()
        ));
    };

    Ok(CliAction::Run(CompareArgs {
        baseline: PathBuf::from(baseline),
        candidate: PathBuf::from(candidate),
        output,
    }))
}
