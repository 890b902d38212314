//! Error types for the extraction stage

use thiserror::Error;

use crate::table::TableError;

/// Errors that can occur while fetching municipalities from the API
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed at the transport layer (connection, timeout, TLS)
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The body was not valid JSON
    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was JSON but not an array of objects
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The raw snapshot could not be written
    #[error("Failed to write raw snapshot: {0}")]
    Snapshot(#[source] TableError),
}

impl FetchError {
    /// Check if the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Request { url, .. } if self.is_timeout() => format!(
                "Request to {url} timed out.\n\nHint: The API may be slow; raise request_timeout_secs."
            ),
            FetchError::Request { url, .. } => format!(
                "Could not reach {url}.\n\nHint: Check network connectivity and the api_url setting."
            ),
            FetchError::Status { url, status } => format!(
                "{url} answered HTTP {status}.\n\nHint: The API may be unavailable; try again later."
            ),
            _ => self.to_string(),
        }
    }
}
