//! IBGE ETL Core - batch pipeline for the Brazilian municipalities dataset
//!
//! Provides the six pipeline stages and their orchestration:
//! - Extraction from the IBGE localities API with a raw CSV snapshot
//! - Profiling of the fetched table
//! - Cleaning and de-duplication by municipality id
//! - Flattening of the nested state hierarchy
//! - Enrichment with macro-region names from a local reference file
//! - Full-replace loading into PostgreSQL

pub mod clean;
pub mod enrich;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod profile;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use clean::{CleanStats, Cleaner};
pub use enrich::{EnrichError, EnrichStats, Enricher};
pub use extract::{FetchError, FetchOutput, Fetcher};
pub use load::{
    Connector, DatabaseSettings, LoadError, LoadOutcome, LoadTarget, Loader, MunicipalityRecord,
    PostgresConnector,
};
pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineReport, PipelineResult,
    PipelineStage, PipelineStatus, run_pipeline,
};
pub use profile::{Profiler, TableProfile};
pub use table::{Cell, Table, TableError};
pub use transform::{TransformError, TransformStats, Transformer};
