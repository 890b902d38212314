//! Extraction stage: fetch municipalities from the IBGE localities API
//!
//! The API answers a single GET with a JSON array of municipality objects. The fetcher turns
//! that array into a [`Table`], writes a raw CSV snapshot, and hands the table on.

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::pipeline::PipelineConfig;
use crate::table::Table;

pub use error::FetchError;

/// Default municipalities endpoint
pub const DEFAULT_API_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades/municipios";

/// Result of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchOutput {
    /// The fetched records as a table
    pub table: Table,
    /// Where the raw snapshot was written
    pub snapshot_path: PathBuf,
    /// Size of the snapshot in bytes
    pub snapshot_bytes: usize,
    /// Hex SHA-256 of the snapshot contents
    pub snapshot_sha256: String,
}

/// HTTP fetcher for the municipalities endpoint
pub struct Fetcher {
    client: reqwest::Client,
    url: String,
    snapshot_path: PathBuf,
}

impl Fetcher {
    /// Create a fetcher with a bounded request timeout
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        snapshot_path: impl Into<PathBuf>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: url.into(),
            snapshot_path: snapshot_path.into(),
        })
    }

    /// Create a fetcher from pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.api_url,
            config.request_timeout(),
            &config.raw_snapshot_path,
        )
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch, tabulate and snapshot the municipalities list
    pub async fn fetch(&self) -> Result<FetchOutput, FetchError> {
        info!(url = %self.url, "Fetching municipalities from API");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body: Value = response.json().await.map_err(|source| FetchError::Decode {
            url: self.url.clone(),
            source,
        })?;

        let table = records_to_table(body)?;
        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Parsed API response"
        );

        let (snapshot_bytes, snapshot_sha256) = write_snapshot(&table, &self.snapshot_path)?;
        info!(
            path = %self.snapshot_path.display(),
            rows = table.row_count(),
            bytes = snapshot_bytes,
            "Raw snapshot saved"
        );

        Ok(FetchOutput {
            table,
            snapshot_path: self.snapshot_path.clone(),
            snapshot_bytes,
            snapshot_sha256,
        })
    }
}

/// Convert a decoded API body into a table
///
/// The body must be a JSON array whose elements are all objects.
pub fn records_to_table(body: Value) -> Result<Table, FetchError> {
    let Value::Array(records) = body else {
        return Err(FetchError::UnexpectedShape(format!(
            "expected a JSON array, found {}",
            json_kind(&body)
        )));
    };

    Table::from_records(records).map_err(|e| FetchError::UnexpectedShape(e.to_string()))
}

/// Write the table as CSV and return its size and digest
fn write_snapshot(table: &Table, path: &Path) -> Result<(usize, String), FetchError> {
    let bytes = table.write_csv_file(path).map_err(FetchError::Snapshot)?;
    let digest = format!("{:x}", Sha256::digest(&bytes));
    Ok((bytes.len(), digest))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
