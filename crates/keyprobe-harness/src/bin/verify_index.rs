use std::env;
use std::process::ExitCode;

use keyprobe_harness::cli::{CliAction, VERIFY_USAGE, VerifyArgs, parse_verify_args};
use keyprobe_harness::engine::EngineCli;
use keyprobe_harness::logging::init_tracing;
use keyprobe_harness::progress::ConsoleProgress;
use keyprobe_harness::report::{VerificationReport, unix_ms_now, write_json};
use keyprobe_harness::verifier::Verifier;
use keyprobe_harness::{EXIT_FAILURE, EXIT_USAGE, Result};

fn run(config: &VerifyArgs) -> Result<bool> {
    let started_unix_ms = unix_ms_now();
    let engine =
        EngineCli::new(&config.engine).with_found_exit_code(config.verifier.found_exit_code);
    let mut verifier = Verifier::new(engine, config.verifier.clone())?;
    let verdict = verifier.run(&config.source, &config.working_dir, &mut ConsoleProgress)?;

    let report = VerificationReport::new(&config.engine, &config.source, verdict, started_unix_ms);
    if let Some(path) = &config.report {
        write_json(path, &report)?;
    }
    println!("{}", report.render_summary());
    Ok(report.verdict.is_success())
}

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match parse_verify_args(&args) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{VERIFY_USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("ERROR keyprobe-verify: {error}\n\n{VERIFY_USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(error) => {
            eprintln!("ERROR keyprobe-verify failed: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
