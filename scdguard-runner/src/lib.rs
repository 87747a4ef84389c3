//! SCDGUARD Runner - Suite Orchestration
//!
//! Loads a TOML run configuration, opens the Source, Stage and Target
//! environments, and runs the selected check families over every table
//! mapping with each check isolated from the others' faults.

pub mod config;
pub mod error;
pub mod suite;
pub mod telemetry;

pub use config::{EnvironmentConfig, EnvironmentsConfig, LoggingConfig, RunnerConfig, CONFIG_ENV};
pub use error::{RunnerError, RunnerResult};
pub use suite::{
    CheckFamily, CheckFault, CheckOutcome, Environments, SuiteReport, ValidationSuite,
};
pub use telemetry::init_logging;
