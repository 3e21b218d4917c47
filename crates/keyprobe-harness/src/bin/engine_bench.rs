use std::env;
use std::process::ExitCode;

use keyprobe_harness::backend::EngineCliBackend;
use keyprobe_harness::cache::dropper_from_config;
use keyprobe_harness::cli::{
    CliAction, ENGINE_BENCH_USAGE, EngineBenchArgs, parse_engine_bench_args,
};
use keyprobe_harness::logging::init_tracing;
use keyprobe_harness::pipeline::run_benchmark;
use keyprobe_harness::progress::ConsoleProgress;
use keyprobe_harness::report::write_json;
use keyprobe_harness::{EXIT_USAGE, Result};

fn run(config: &EngineBenchArgs) -> Result<f64> {
    config.cache.validate()?;
    let mut backend = EngineCliBackend::new(&config.engine_caller, &config.index_file);
    let mut dropper = dropper_from_config(&config.cache);

    let report = run_benchmark(
        &config.sampling,
        &config.source,
        &mut backend,
        dropper.as_mut(),
        &mut ConsoleProgress,
    )?;
    if let Some(path) = &config.report {
        write_json(path, &report)?;
    }
    report.mean_ms()
}

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match parse_engine_bench_args(&args) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{ENGINE_BENCH_USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("ERROR keyprobe-engine-bench: {error}\n\n{ENGINE_BENCH_USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&config) {
        Ok(mean_ms) => {
            println!("B-tree benchmark done, result: {mean_ms:.3}ms");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("ERROR keyprobe-engine-bench failed: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
