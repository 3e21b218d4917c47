use std::env;
use std::process::ExitCode;

use keyprobe_harness::cli::{COMPARE_USAGE, CliAction, CompareArgs, parse_compare_args};
use keyprobe_harness::logging::init_tracing;
use keyprobe_harness::report::{BenchmarkReport, compare_reports, read_json, write_json};
use keyprobe_harness::{EXIT_USAGE, Result};

fn run(config: &CompareArgs) -> Result<()> {
    let baseline: BenchmarkReport = read_json(&config.baseline)?;
    let candidate: BenchmarkReport = read_json(&config.candidate)?;
    let comparison = compare_reports(&baseline, &candidate)?;

    println!("{}", comparison.render_summary(candidate.extracted_samples));
    if let Some(path) = &config.output {
        write_json(path, &comparison)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match parse_compare_args(&args) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{COMPARE_USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("ERROR keyprobe-compare: {error}\n\n{COMPARE_USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR keyprobe-compare failed: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
