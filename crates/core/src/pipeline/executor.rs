//! Pipeline executor for running the full ETL pipeline

use std::time::Instant;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use super::config::{PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use super::report::{PipelineReport, StageOutput};
use crate::clean::Cleaner;
use crate::enrich::Enricher;
use crate::extract::{FetchError, FetchOutput, Fetcher};
use crate::load::{
    Connector, DatabaseSettings, FINAL_COLUMNS, LoadOutcome, Loader, PostgresConnector,
    select_final_columns,
};
use crate::profile::Profiler;
use crate::table::{Table, TableResult};
use crate::transform::Transformer;

/// Pipeline executor that runs all stages
pub struct PipelineExecutor<C: Connector = PostgresConnector> {
    config: PipelineConfig,
    loader: Loader,
    connector: C,
    run_id: String,
    config_hash: String,
}

impl PipelineExecutor<PostgresConnector> {
    /// Create a new pipeline executor loading into PostgreSQL
    pub fn new(config: PipelineConfig, settings: DatabaseSettings) -> PipelineResult<Self> {
        Self::with_connector(config, settings, PostgresConnector)
    }
}

impl<C: Connector> PipelineExecutor<C> {
    /// Create an executor with a custom connector
    pub fn with_connector(
        config: PipelineConfig,
        settings: DatabaseSettings,
        connector: C,
    ) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::InvalidConfig)?;

        let config_hash = Self::hash_config(&config)?;
        let loader = Loader::new(settings, &config.table_name);

        Ok(Self {
            config,
            loader,
            connector,
            run_id: Uuid::new_v4().to_string(),
            config_hash,
        })
    }

    /// Run ID shared by every event of this run
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Effective configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline
    ///
    /// A failed fetch or enrichment returns an `Aborted` report, and a load that did not
    /// succeed still completes the run unless `fail_on_load_error` is set. `Err` is reserved
    /// for input that violates a stage's preconditions, in which case the `Failed` report is still
    /// saved, and for a report that cannot be saved.
    pub async fn run(&self) -> PipelineResult<PipelineReport> {
        let span = info_span!("pipeline_run", run_id = %self.run_id);
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> PipelineResult<PipelineReport> {
        let mut report = PipelineReport::new(&self.run_id, &self.config_hash);
        info!(
            run_id = %self.run_id,
            stages = ?PipelineStage::all().iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Starting IBGE data pipeline"
        );

        // 1. Extract
        let stage = PipelineStage::Extract;
        let start = Instant::now();
        let fetched = match self.extract().instrument(stage_span(stage)).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(stage = stage.name(), error = %e, "Failed to fetch data from API");
                let message = e.user_message();
                let output = StageOutput::failed(&message).with_duration(elapsed(start));
                report.abort(stage, output, message);
                return self.finish(report);
            }
        };
        report.complete_stage(
            stage,
            StageOutput::ok()
                .with_file(&fetched.snapshot_path)
                .with_metric("rows", json!(fetched.table.row_count()))
                .with_metric("columns", json!(fetched.table.column_count()))
                .with_metric("snapshot_bytes", json!(fetched.snapshot_bytes))
                .with_metric("snapshot_sha256", json!(fetched.snapshot_sha256))
                .with_duration(elapsed(start)),
        );
        let table = fetched.table;

        // 2. Profile
        let stage = PipelineStage::Profile;
        let start = Instant::now();
        let profile = stage_span(stage)
            .in_scope(|| Profiler::new(self.config.profile_sample_rows).run(&table));
        report.complete_stage(
            stage,
            StageOutput::ok()
                .with_metric("shape", json!(profile.shape()))
                .with_duration(elapsed(start)),
        );

        // 3. Clean
        let stage = PipelineStage::Clean;
        let start = Instant::now();
        let (table, stats) = stage_span(stage)
            .in_scope(|| Cleaner::default().clean_with_stats(table))
            .map_err(|e| self.reject(&mut report, stage, start, e.user_message(), e))?;
        report.complete_stage(
            stage,
            StageOutput::ok()
                .with_metric("rows", json!(table.row_count()))
                .with_metric("duplicates_removed", json!(stats.duplicates_removed))
                .with_duration(elapsed(start)),
        );

        // 4. Transform
        let stage = PipelineStage::Transform;
        let start = Instant::now();
        let (table, stats) = stage_span(stage)
            .in_scope(|| {
                Transformer::new(self.config.strict_hierarchy).transform_with_stats(table)
            })
            .map_err(|e| self.reject(&mut report, stage, start, e.user_message(), e))?;
        report.complete_stage(
            stage,
            StageOutput::ok()
                .with_metric("broken_hierarchy_rows", json!(stats.broken_hierarchy_rows))
                .with_metric("coerced_to_null", json!(stats.coerced_to_null))
                .with_duration(elapsed(start)),
        );

        // 5. Enrich
        let stage = PipelineStage::Enrich;
        let start = Instant::now();
        let enricher = Enricher::from_config(&self.config);
        let enriched = stage_span(stage).in_scope(|| enricher.enrich_with_stats(table));
        let (table, stats) = match enriched {
            Ok(result) => result,
            Err(e) => {
                error!(
                    stage = stage.name(),
                    path = %enricher.reference_path().display(),
                    error = %e,
                    "Enrichment failed"
                );
                let message = e.user_message();
                let output = StageOutput::failed(&message).with_duration(elapsed(start));
                report.abort(stage, output, message);
                return self.finish(report);
            }
        };
        report.complete_stage(
            stage,
            StageOutput::ok()
                .with_metric("rows", json!(table.row_count()))
                .with_metric("reference_rows", json!(stats.reference_rows))
                .with_metric("unmatched_rows", json!(stats.unmatched_rows))
                .with_duration(elapsed(start)),
        );

        // 6. Load
        let stage = PipelineStage::Load;
        let start = Instant::now();
        let records = select_final_columns(&table)
            .and_then(|records| self.log_preview(&table).map(|()| records))
            .map_err(|e| self.reject(&mut report, stage, start, e.user_message(), e))?;

        let outcome = self
            .loader
            .load(&self.connector, &records)
            .instrument(stage_span(stage))
            .await;
        let output = match &outcome {
            LoadOutcome::Loaded { rows } => {
                StageOutput::ok().with_metric("rows", json!(rows))
            }
            LoadOutcome::Skipped { .. } => StageOutput::skipped(outcome.describe()),
            LoadOutcome::Failed(_) => StageOutput::failed(outcome.describe()),
        };
        report.complete_stage(
            stage,
            output
                .with_metric("table", json!(self.loader.schema().table))
                .with_metric("outcome", json!(outcome.label()))
                .with_duration(elapsed(start)),
        );

        if outcome.is_loaded() {
            report.complete();
        } else if self.config.fail_on_load_error {
            report.fail(stage, outcome.describe());
        } else {
            warn!(outcome = outcome.label(), "Load did not succeed; run still completes");
            report.complete();
        }

        self.finish(report)
    }

    async fn extract(&self) -> Result<FetchOutput, FetchError> {
        Fetcher::from_config(&self.config)?.fetch().await
    }

    fn log_preview(&self, table: &Table) -> TableResult<()> {
        let preview = table
            .select(&FINAL_COLUMNS)?
            .head(self.config.profile_sample_rows);
        info!("Final table preview:\n{}", preview.render());
        Ok(())
    }

    fn finish(&self, report: PipelineReport) -> PipelineResult<PipelineReport> {
        info!(
            run_id = %report.run_id,
            status = %report.status,
            duration_ms = report.duration_ms(),
            stages_completed = report.stages_completed.len(),
            "Pipeline finished"
        );
        self.save_report(&report)?;
        Ok(report)
    }

    /// Fail the run on malformed stage input, keeping the report on disk
    fn reject<E>(
        &self,
        report: &mut PipelineReport,
        stage: PipelineStage,
        start: Instant,
        message: String,
        err: E,
    ) -> PipelineError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        error!(stage = stage.name(), error = %err, "Stage input is malformed");
        report
            .outputs
            .insert(stage, StageOutput::failed(&message).with_duration(elapsed(start)));
        report.fail(stage, message);

        if let Err(save_err) = self.save_report(report) {
            warn!(error = %save_err, "Run report could not be saved");
        }
        PipelineError::precondition(stage, err)
    }

    fn save_report(&self, report: &PipelineReport) -> PipelineResult<()> {
        if let Some(ref path) = self.config.report_path {
            report.save(path)?;
            info!(path = %path.display(), "Run report saved");
        }
        Ok(())
    }

    /// Hash the config for the run report
    fn hash_config(config: &PipelineConfig) -> PipelineResult<String> {
        let bytes = serde_json::to_vec(config)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

fn stage_span(stage: PipelineStage) -> Span {
    let span = info_span!("pipeline_stage", stage = stage.name(), index = stage.index());
    span.in_scope(|| info!("{}", stage.description()));
    span
}

fn elapsed(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
