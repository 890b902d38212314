//! Run report: what each stage produced and how the run ended

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::PipelineStage;
use super::error::{PipelineError, PipelineResult};

/// Report of one pipeline run, written as JSON when `report_path` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    /// SHA-256 of the effective configuration
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: PipelineStatus,
    /// Stages that ran to the end, in execution order
    pub stages_completed: Vec<PipelineStage>,
    /// Stage that aborted or failed the run
    pub stopped_at: Option<PipelineStage>,
    pub outputs: BTreeMap<PipelineStage, StageOutput>,
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn new(run_id: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            config_hash: config_hash.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: PipelineStatus::Running,
            stages_completed: Vec::new(),
            stopped_at: None,
            outputs: BTreeMap::new(),
            error: None,
        }
    }

    /// Record a stage that ran to the end, whatever its outcome
    pub fn complete_stage(&mut self, stage: PipelineStage, output: StageOutput) {
        self.stages_completed.push(stage);
        self.outputs.insert(stage, output);
    }

    /// Stop the run at `stage`; later stages never execute
    pub fn abort(&mut self, stage: PipelineStage, output: StageOutput, error: impl Into<String>) {
        self.outputs.insert(stage, output);
        self.finish(PipelineStatus::Aborted, Some(stage), Some(error.into()));
    }

    /// End the run as failed after `stage` has been recorded
    pub fn fail(&mut self, stage: PipelineStage, error: impl Into<String>) {
        self.finish(PipelineStatus::Failed, Some(stage), Some(error.into()));
    }

    pub fn complete(&mut self) {
        self.finish(PipelineStatus::Completed, None, None);
    }

    fn finish(
        &mut self,
        status: PipelineStatus,
        stopped_at: Option<PipelineStage>,
        error: Option<String>,
    ) {
        self.status = status;
        self.stopped_at = stopped_at;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    pub fn is_stage_completed(&self, stage: PipelineStage) -> bool {
        self.stages_completed.contains(&stage)
    }

    pub fn stage_output(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.outputs.get(&stage)
    }

    /// Wall-clock run time; a running report measures up to now
    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Duration as `250ms`, `12s` or `1m 5s`
    pub fn duration_formatted(&self) -> String {
        let ms = self.duration_ms();
        match (ms / 60_000, ms / 1000 % 60) {
            (0, 0) => format!("{ms}ms"),
            (0, secs) => format!("{secs}s"),
            (mins, secs) => format!("{mins}m {secs}s"),
        }
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::report_io(parent, "directory creation", e))?;
        }
        std::fs::write(path, json).map_err(|e| PipelineError::report_io(path, "write", e))
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| PipelineError::report_io(path, "read", e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Print a per-stage summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Run {} {} in {}", self.run_id, self.status, self.duration_formatted());

        for (stage, output) in &self.outputs {
            eprintln!(
                "  {}. {:<9} {:<7} {:>6}ms",
                stage.index(),
                stage.name(),
                output.state,
                output.duration_ms
            );
            for line in output.note.iter().flat_map(|note| note.lines()) {
                eprintln!("       {line}");
            }
        }

        if let Some(ref error) = self.error {
            eprintln!("Error: {error}");
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    /// Every stage ran; the load may still have been skipped or failed
    Completed,
    /// Fetch or enrichment failed and later stages did not run
    Aborted,
    /// A stage received malformed input, or the load did not succeed and
    /// `fail_on_load_error` is set
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What one stage produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub state: StageState,
    /// Skip reason or failure message
    pub note: Option<String>,
    /// Files written by the stage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
    /// Row counts, digests and other stage figures
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    pub duration_ms: u64,
}

impl StageOutput {
    fn new(state: StageState, note: Option<String>) -> Self {
        Self {
            state,
            note,
            files: Vec::new(),
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    pub fn ok() -> Self {
        Self::new(StageState::Ok, None)
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::new(StageState::Skipped, Some(reason.into()))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(StageState::Failed, Some(message.into()))
    }

    pub fn is_ok(&self) -> bool {
        self.state == StageState::Ok
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}
