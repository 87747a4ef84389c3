//! scdguard batch entry point
//!
//! Runs a validation suite over JSON snapshot fixtures and prints the
//! suite report as JSON. Exit status is 0 when every check passed, 1 when
//! a check failed or aborted, and 2 when the run could not start.

use scdguard_runner::{
    init_logging, Environments, RunnerConfig, RunnerResult, SuiteReport, ValidationSuite,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(report) => match report.ensure_passed() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::warn!(run_id = %report.run_id, error = %err, "Validation failed");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("scdguard: {err}");
            ExitCode::from(2)
        }
    }
}

fn run() -> RunnerResult<SuiteReport> {
    let config = RunnerConfig::load()?;
    init_logging(&config.logging)?;

    let source = config.environments.source.open()?;
    let stage = config.environments.stage.open()?;
    let target = config.environments.target.open()?;

    let suite = ValidationSuite::new(
        Environments {
            source: &source,
            stage: &stage,
            target: &target,
        },
        &config.columns,
        config.validation_config()?,
        config.run_date(),
    )?;
    let report = suite.run(&config.mappings, &config.checks);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}
