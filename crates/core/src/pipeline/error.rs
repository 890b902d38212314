//! Errors that prevent a pipeline run from being carried out
//!
//! A failed fetch, a missing reference file or a failed load is recorded in the
//! [`PipelineReport`](super::PipelineReport) instead. A [`PipelineError`] is returned for
//! configuration the run cannot start with, for a table that lacks the columns a stage
//! requires, and for a run report that cannot be read or written.

use std::path::PathBuf;
use thiserror::Error;

use super::config::{ConfigError, PipelineStage};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration values failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// The table handed to a stage does not have the shape it needs
    #[error("{stage} stage received malformed input: {source}")]
    Precondition {
        stage: PipelineStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Run report {action} failed for {}: {source}", .path.display())]
    ReportIo {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Run report is not valid JSON: {0}")]
    ReportJson(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn precondition<E>(stage: PipelineStage, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Precondition {
            stage,
            source: Box::new(source),
        }
    }

    pub fn report_io(
        path: impl Into<PathBuf>,
        action: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::ReportIo {
            path: path.into(),
            action,
            source,
        }
    }

    /// Stage whose input was malformed, if that is what went wrong
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Precondition { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidConfig(msg) => format!(
                "Invalid configuration: {msg}\n\nHint: Check the values in your ibge-etl.toml."
            ),
            PipelineError::ConfigFile(err) => err.user_message(),
            PipelineError::Precondition { .. } => format!(
                "{self}\n\nHint: The API response no longer has the expected columns."
            ),
            PipelineError::ReportIo { path, .. } => format!(
                "{self}\n\nHint: Check that {} is writable.",
                path.display()
            ),
            PipelineError::ReportJson(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableError;

    #[test]
    fn test_precondition_names_stage() {
        let source = TableError::missing_column("id", &["codigo".to_string()]);
        let err = PipelineError::precondition(PipelineStage::Clean, source);
        assert!(err.to_string().starts_with("clean stage"));
        assert!(err.to_string().contains("id"));
        assert_eq!(err.stage(), Some(PipelineStage::Clean));
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_report_io_includes_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = PipelineError::report_io("/var/run/report.json", "write", io_err);
        let display = err.to_string();
        assert!(display.contains("/var/run/report.json"));
        assert!(display.contains("write"));
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_invalid_config_message() {
        let err = PipelineError::InvalidConfig("request_timeout_secs must be > 0".to_string());
        let msg = err.user_message();
        assert!(msg.contains("request_timeout_secs"));
        assert!(msg.contains("Hint:"));
    }
}
