//! Pipeline configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::DEFAULT_API_URL;
use crate::load::{DEFAULT_TABLE_NAME, is_valid_identifier};

/// Default raw snapshot file
pub const DEFAULT_SNAPSHOT_PATH: &str = "dados_brutos_municipios.csv";
/// Default enrichment reference file
pub const DEFAULT_REFERENCE_PATH: &str = "regioes_enriquecimento.csv";
/// Default HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors reading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Read { path, .. } => format!(
                "{self}\n\nHint: Check that {} exists or run without --config to use defaults.",
                path.display()
            ),
            ConfigError::Parse { .. } => {
                format!("{self}\n\nHint: Keys must match the fields of the [pipeline] settings.")
            }
            ConfigError::Invalid(_) => {
                format!("{self}\n\nHint: Check your pipeline configuration file.")
            }
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Municipalities endpoint
    pub api_url: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Where the raw CSV snapshot is written after a successful fetch
    pub raw_snapshot_path: PathBuf,
    /// Enrichment reference CSV
    pub reference_path: PathBuf,
    /// Destination table name
    pub table_name: String,
    /// Rows shown in the profiler sample and the final preview
    pub profile_sample_rows: usize,
    /// Fail the transform stage on rows without a state record
    pub strict_hierarchy: bool,
    /// Mark the run failed when the load is skipped or fails
    pub fail_on_load_error: bool,
    /// Where to write the JSON run report, if anywhere
    pub report_path: Option<PathBuf>,
    /// Log output settings
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            raw_snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            reference_path: PathBuf::from(DEFAULT_REFERENCE_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            profile_sample_rows: 5,
            strict_hierarchy: false,
            fail_on_load_error: false,
            report_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML config file; absent keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the API URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the raw snapshot path
    pub fn with_raw_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_snapshot_path = path.into();
        self
    }

    /// Set the enrichment reference path
    pub fn with_reference_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_path = path.into();
        self
    }

    /// Set the destination table
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the number of sample rows
    pub fn with_profile_sample_rows(mut self, rows: usize) -> Self {
        self.profile_sample_rows = rows;
        self
    }

    /// Enable strict hierarchy checking
    pub fn with_strict_hierarchy(mut self, strict: bool) -> Self {
        self.strict_hierarchy = strict;
        self
    }

    /// Treat load skips and failures as a failed run
    pub fn with_fail_on_load_error(mut self, fail: bool) -> Self {
        self.fail_on_load_error = fail;
        self
    }

    /// Write the run report to a file
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Set logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.trim().is_empty() {
            return Err("API URL must not be empty".to_string());
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(format!("API URL must be http(s): {}", self.api_url));
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be at least one second".to_string());
        }
        if self.raw_snapshot_path.as_os_str().is_empty() {
            return Err("Raw snapshot path must not be empty".to_string());
        }
        if self.reference_path.as_os_str().is_empty() {
            return Err("Reference path must not be empty".to_string());
        }
        if !is_valid_identifier(&self.table_name) {
            return Err(format!("Invalid table name: '{}'", self.table_name));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// The six stages of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Stage 1: Fetch from the API and snapshot
    Extract,
    /// Stage 2: Log table diagnostics
    Profile,
    /// Stage 3: Rename and de-duplicate
    Clean,
    /// Stage 4: Flatten the hierarchy and coerce identifiers
    Transform,
    /// Stage 5: Join the region reference
    Enrich,
    /// Stage 6: Replace the destination table
    Load,
}

impl PipelineStage {
    /// Execution order
    pub const ALL: [Self; 6] = [
        Self::Extract,
        Self::Profile,
        Self::Clean,
        Self::Transform,
        Self::Enrich,
        Self::Load,
    ];

    pub fn all() -> &'static [Self] {
        &Self::ALL
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Profile => "profile",
            Self::Clean => "clean",
            Self::Transform => "transform",
            Self::Enrich => "enrich",
            Self::Load => "load",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Extract => "Fetch municipalities and save a raw snapshot",
            Self::Profile => "Log shape, types and statistics",
            Self::Clean => "Rename columns and remove duplicate municipalities",
            Self::Transform => "Flatten state fields and coerce identifiers",
            Self::Enrich => "Add macro-region names",
            Self::Load => "Replace the destination table",
        }
    }

    /// 1-based position in [`Self::ALL`]
    pub fn index(&self) -> usize {
        *self as usize + 1
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.raw_snapshot_path, PathBuf::from("dados_brutos_municipios.csv"));
        assert_eq!(config.reference_path, PathBuf::from("regioes_enriquecimento.csv"));
        assert_eq!(config.table_name, "municipios_brasil");
        assert!(!config.strict_hierarchy);
        assert!(!config.fail_on_load_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_builder() {
        let config = PipelineConfig::new()
            .with_api_url("http://127.0.0.1:8080/municipios")
            .with_raw_snapshot_path("/tmp/raw.csv")
            .with_table_name("municipios_teste")
            .with_fail_on_load_error(true)
            .with_strict_hierarchy(true)
            .with_profile_sample_rows(10)
            .with_logging(LoggingConfig {
                level: "warn".to_string(),
                ansi: false,
            });

        assert_eq!(config.api_url, "http://127.0.0.1:8080/municipios");
        assert!(config.strict_hierarchy);
        assert_eq!(config.profile_sample_rows, 10);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.raw_snapshot_path, PathBuf::from("/tmp/raw.csv"));
        assert!(config.fail_on_load_error);
    }

    #[test]
    fn test_config_validation() {
        assert!(PipelineConfig::new().with_api_url("").validate().is_err());
        assert!(PipelineConfig::new().with_api_url("ftp://x").validate().is_err());
        assert!(PipelineConfig::new().with_request_timeout_secs(0).validate().is_err());
        assert!(PipelineConfig::new().with_reference_path("").validate().is_err());
        assert!(
            PipelineConfig::new()
                .with_table_name("municipios; DROP TABLE x")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_from_toml_file_partial() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pipeline.toml");
        std::fs::write(
            &path,
            r#"
table_name = "municipios_dev"
request_timeout_secs = 5

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.table_name, "municipios_dev");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.ansi);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_from_toml_file_errors() {
        let temp = TempDir::new().unwrap();
        let missing = PipelineConfig::from_toml_file(&temp.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "unknown_key = 1").unwrap();
        let err = PipelineConfig::from_toml_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_pipeline_stage_properties() {
        let stages = PipelineStage::all();
        assert_eq!(stages.len(), 6);
        for (i, stage) in stages.iter().enumerate() {
            assert_eq!(stage.index(), i + 1);
        }
        assert_eq!(PipelineStage::Load.to_string(), "load");
        assert_eq!(PipelineStage::all().last(), Some(&PipelineStage::Load));
    }
}
