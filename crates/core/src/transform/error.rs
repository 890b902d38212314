//! Error types for the transform stage

use thiserror::Error;

use crate::table::TableError;

/// Errors that can occur while reshaping the table
#[derive(Error, Debug)]
pub enum TransformError {
    /// A required column is missing or a column operation failed
    #[error(transparent)]
    Table(#[from] TableError),

    /// Rows whose nested hierarchy does not reach the state record (strict mode only)
    #[error("{rows} row(s) lack the nested path {path}; first at row {first_row}")]
    BrokenHierarchy {
        path: String,
        rows: usize,
        first_row: usize,
    },
}

impl TransformError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            TransformError::Table(err) => err.user_message(),
            TransformError::BrokenHierarchy { path, rows, .. } => format!(
                "{rows} row(s) do not contain {path}.\n\n\
                Hint: The API nesting may have changed; disable strict_hierarchy to load them with null state fields."
            ),
        }
    }
}
