//! CLI error types

use ibge_etl_core::pipeline::{ConfigError, PipelineError};
use thiserror::Error;

/// Errors that end the CLI before or during a pipeline run
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl CliError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CliError::Config(err) => err.user_message(),
            CliError::InvalidArgument(msg) => {
                format!("Invalid argument: {msg}\n\nHint: Run with --help to see usage.")
            }
            CliError::Pipeline(err) => err.user_message(),
        }
    }
}
