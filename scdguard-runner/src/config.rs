//! Configuration loading for the scdguard runner.
//!
//! Environments and mappings are required. `validation` falls back to the
//! warehouse defaults, `checks` to every family, `run_date` to today (UTC).

use crate::error::{RunnerError, RunnerResult};
use crate::suite::CheckFamily;
use chrono::{NaiveDate, Utc};
use scdguard_core::{ColumnSpec, SafeIdent, TableMapping, ValidationConfig};
use scdguard_storage::{DatabaseFixture, InMemoryDatabase};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "SCDGUARD_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    pub environments: EnvironmentsConfig,
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
    /// `"YYYY-MM-DD"`; the day re-added records must be versioned on
    #[serde(default)]
    pub run_date: Option<NaiveDate>,
    #[serde(default = "CheckFamily::all")]
    pub checks: Vec<CheckFamily>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    pub mappings: Vec<TableMapping>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentsConfig {
    pub source: EnvironmentConfig,
    pub stage: EnvironmentConfig,
    pub target: EnvironmentConfig,
}

/// One environment backed by a JSON snapshot fixture.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Reported in the `Database` field; overrides the fixture's name
    pub label: String,
    /// Relative paths resolve against the config file's directory
    pub fixture: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl RunnerConfig {
    /// Locate, parse, and validate the config file.
    pub fn load() -> RunnerResult<Self> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(RunnerError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; fixture paths resolve against its directory.
    pub fn from_path(path: &Path) -> RunnerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&contents, base)
    }

    pub fn from_toml(contents: &str, base: &Path) -> RunnerResult<Self> {
        let mut config: RunnerConfig = toml::from_str(contents)?;
        for env in [
            &mut config.environments.source,
            &mut config.environments.stage,
            &mut config.environments.target,
        ] {
            if env.fixture.is_relative() {
                env.fixture = base.join(&env.fixture);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> RunnerResult<()> {
        for (field, env) in [
            ("environments.source", &self.environments.source),
            ("environments.stage", &self.environments.stage),
            ("environments.target", &self.environments.target),
        ] {
            if env.label.trim().is_empty() {
                return Err(invalid(format!("{field}.label"), "must not be empty"));
            }
            if env.fixture.as_os_str().is_empty() {
                return Err(invalid(format!("{field}.fixture"), "must not be empty"));
            }
        }
        if self.checks.is_empty() {
            return Err(invalid("checks", "at least one check family is required"));
        }
        if self.mappings.is_empty() {
            return Err(invalid("mappings", "at least one table mapping is required"));
        }
        for (i, mapping) in self.mappings.iter().enumerate() {
            let tables = [
                Some(mapping.source_table.as_str()),
                Some(mapping.target_table.as_str()),
                mapping.stage(),
                mapping.deleted(),
                mapping.view(),
            ];
            for table in tables.into_iter().flatten() {
                SafeIdent::parse(table)
                    .map_err(|e| invalid(format!("mappings[{i}]"), e.to_string()))?;
            }
        }
        for (i, spec) in self.columns.iter().enumerate() {
            if spec.table_name.trim().is_empty() || spec.column_name.trim().is_empty() {
                return Err(invalid(
                    format!("columns[{i}]"),
                    "table_name and column_name must not be empty",
                ));
            }
        }
        self.validation_config()?;
        Ok(())
    }

    /// The configured validation settings, or the warehouse defaults.
    pub fn validation_config(&self) -> RunnerResult<ValidationConfig> {
        let config = match &self.validation {
            Some(config) => config.clone(),
            None => ValidationConfig::warehouse_defaults()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl EnvironmentConfig {
    /// Load the fixture into an in-memory database named by `label`.
    pub fn open(&self) -> RunnerResult<InMemoryDatabase> {
        let contents = std::fs::read_to_string(&self.fixture).map_err(|source| RunnerError::Io {
            path: self.fixture.clone(),
            source,
        })?;
        let mut fixture: DatabaseFixture = serde_json::from_str(&contents)?;
        fixture.database = self.label.clone();
        let db = InMemoryDatabase::from_fixture(fixture)?;
        tracing::info!(
            database = %self.label,
            fixture = %self.fixture.display(),
            "Environment loaded"
        );
        Ok(db)
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> RunnerError {
    RunnerError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
