//! Error types for table operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`Table`](super::Table) operations
#[derive(Error, Debug)]
pub enum TableError {
    /// A column the operation depends on is absent
    #[error("Column '{column}' not found (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// A column with the same name already exists
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    /// A row does not have one cell per column
    #[error("Row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A new column does not have one value per row
    #[error("Column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A record that should be a JSON object is not
    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    /// Delimited text could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error with path context
    #[error("IO error with {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

impl TableError {
    /// Create a missing-column error listing the columns that do exist
    pub fn missing_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::MissingColumn {
            column: column.into(),
            available: available.to_vec(),
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check whether this error means a file did not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            TableError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            TableError::Csv(err) => matches!(
                err.kind(),
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            TableError::MissingColumn { column, available } => format!(
                "Column '{column}' not found.\nAvailable columns: {}\n\n\
                Hint: The upstream data shape may have changed.",
                available.join(", ")
            ),
            TableError::Io { path, source } => format!(
                "Cannot access {}: {source}\n\nHint: Check that the path exists and is readable.",
                path.display()
            ),
            _ => self.to_string(),
        }
    }
}
