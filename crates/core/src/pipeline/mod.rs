//! Full pipeline orchestration for the IBGE municipalities ETL
//!
//! This module runs the six stages in order:
//!
//! 1. **Extract**: Fetch the municipalities array and save a raw CSV snapshot
//! 2. **Profile**: Log shape, types, statistics and a sample
//! 3. **Clean**: Rename identifier columns and drop duplicate municipalities
//! 4. **Transform**: Flatten the state hierarchy and coerce identifiers
//! 5. **Enrich**: Left-join the macro-region reference file
//! 6. **Load**: Replace the destination table and add its primary key
//!
//! A failed fetch or a missing reference file aborts the run. A load that is skipped or fails
//! is logged and the run still completes, unless `fail_on_load_error` is set.
//!
//! # Example
//!
//! ```rust,no_run
//! use ibge_etl_core::load::DatabaseSettings;
//! use ibge_etl_core::pipeline::{PipelineConfig, run_pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new()
//!     .with_reference_path("regioes_enriquecimento.csv")
//!     .with_report_path("run_report.json");
//!
//! let report = run_pipeline(config, DatabaseSettings::from_env()).await?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod executor;
mod report;

pub use config::{
    ConfigError, DEFAULT_REFERENCE_PATH, DEFAULT_SNAPSHOT_PATH, DEFAULT_TIMEOUT_SECS,
    LoggingConfig, PipelineConfig, PipelineStage,
};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineExecutor;
pub use report::{PipelineReport, PipelineStatus, StageOutput, StageState};

use crate::load::DatabaseSettings;

/// Run a pipeline with the given configuration, loading into PostgreSQL
///
/// This is a convenience function for simple pipeline execution.
pub async fn run_pipeline(
    config: PipelineConfig,
    settings: DatabaseSettings,
) -> PipelineResult<PipelineReport> {
    let executor = PipelineExecutor::new(config, settings)?;
    executor.run().await
}
