//! Error types for the load stage

use thiserror::Error;

/// Errors that can occur while writing to the destination database
#[derive(Error, Debug)]
pub enum LoadError {
    /// One or more required connection settings are unset
    #[error("Missing database credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    /// A connection setting has an unusable value
    #[error("Invalid value for {name}: {value}")]
    InvalidSetting { name: String, value: String },

    /// Could not open a connection
    #[error("Failed to connect to {host}/{database}: {message}")]
    Connect {
        host: String,
        database: String,
        message: String,
    },

    /// Dropping or creating the destination table failed
    #[error("Schema error on table {table}: {message}")]
    Schema { table: String, message: String },

    /// Inserting rows failed
    #[error("Insert into {table} failed after {inserted} rows: {message}")]
    Insert {
        table: String,
        inserted: usize,
        message: String,
    },

    /// Adding the primary key failed, usually because of duplicate or null keys
    #[error("Could not add primary key on {table}.{column}: {message}")]
    Constraint {
        table: String,
        column: String,
        message: String,
    },
}

impl LoadError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::MissingCredentials(names) => format!(
                "Database credentials not found: {}\n\n\
                Hint: Set them in the environment or in a .env file next to the working directory.",
                names.join(", ")
            ),
            LoadError::InvalidSetting { name, value } => {
                format!("Invalid value '{value}' for {name}.\n\nHint: DB_PORT must be a port number.")
            }
            LoadError::Connect { host, .. } => format!(
                "{self}\n\nHint: Check that the database server at {host} is running and reachable."
            ),
            LoadError::Constraint { column, .. } => format!(
                "{self}\n\nHint: The data contains duplicate or null values in {column}."
            ),
            _ => self.to_string(),
        }
    }
}
