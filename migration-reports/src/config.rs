//! Configuration for migration-reports

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "migration-reports.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
    /// External service backend
    #[serde(default)]
    pub service: ServiceConfig,
    /// Collector behaviour
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Console logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory receiving exports, summaries and the audit log
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// Audit log file name, relative to `directory`
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// Which backend answers the diagnostic queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Exchange management shell child process
    Shell,
    /// Previously captured JSON documents
    Snapshot,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Shell => write!(f, "shell"),
            BackendKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Shell executable
    #[serde(default = "default_program")]
    pub program: String,
    /// Script line run before every query (e.g. Connect-ExchangeOnline)
    #[serde(default)]
    pub prelude: String,
    /// `ConvertTo-Json -Depth` value
    #[serde(default = "default_json_depth")]
    pub json_depth: u32,
    /// Directory read by the snapshot backend
    pub snapshot_dir: Option<PathBuf>,
}

/// Collector configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorConfig {
    /// Query the tenant-wide MigrationConfig once per run
    #[serde(default = "default_true")]
    pub cache_migration_config: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("MigrationReports")
}

fn default_log_file() -> String {
    "MigrationReports.log".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::Shell
}

fn default_program() -> String {
    "pwsh".to_string()
}

fn default_json_depth() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            log_file: default_log_file(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            program: default_program(),
            prelude: String::new(),
            json_depth: default_json_depth(),
            snapshot_dir: None,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cache_migration_config: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ReportError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Path of the run-scoped audit log
    pub fn log_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.log_file)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.output.directory.as_os_str().is_empty() {
            return Err(ReportError::Config("Output directory is empty".to_string()));
        }

        if self.output.log_file.trim().is_empty() {
            return Err(ReportError::Config("Log file name is empty".to_string()));
        }

        if self.service.json_depth == 0 {
            return Err(ReportError::Config("json_depth must be at least 1".to_string()));
        }

        if self.service.backend == BackendKind::Shell && self.service.program.trim().is_empty() {
            return Err(ReportError::Config("Shell program is empty".to_string()));
        }

        if self.service.backend == BackendKind::Snapshot && self.service.snapshot_dir.is_none() {
            return Err(ReportError::Config(
                "Snapshot backend requires service.snapshot_dir".to_string(),
            ));
        }

        Ok(())
    }
}
