//! Error types for the enrichment stage

use std::path::PathBuf;
use thiserror::Error;

use crate::table::TableError;

/// Errors that can occur while enriching with the reference file
#[derive(Error, Debug)]
pub enum EnrichError {
    /// The reference file does not exist
    #[error("Enrichment file not found: {}", .0.display())]
    ReferenceNotFound(PathBuf),

    /// The reference file exists but could not be read
    #[error("Failed to read enrichment file {}: {source}", .path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    /// A join column is missing from one side
    #[error(transparent)]
    Table(#[from] TableError),
}

impl EnrichError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            EnrichError::ReferenceNotFound(path) => format!(
                "Enrichment file not found: {}\n\n\
                Hint: Create it with the columns codigo_uf,nome_regiao or set reference_path.",
                path.display()
            ),
            EnrichError::Reference { path, source } => format!(
                "Cannot read enrichment file {}: {source}\n\nHint: Ensure it is UTF-8 CSV with a header row.",
                path.display()
            ),
            EnrichError::Table(err) => err.user_message(),
        }
    }
}
