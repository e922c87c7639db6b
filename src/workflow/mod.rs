//! Durable workflow runtime
//!
//! A run is a linear sequence of named steps. Each step's output is persisted
//! to the run's journal before the next step begins, so a process restart can
//! re-enter the run and skip everything already done. Steps are retryable as
//! whole units; step bodies must tolerate re-execution.

pub mod quiz_generation;
pub mod study_session;

pub use quiz_generation::{QuizGenerationParams, QuizGenerationWorkflow};
pub use study_session::{StudySessionParams, StudySessionWorkflow};

use anyhow::{Context as AnyhowContext, Result as AnyhowResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{Result, StudyError};
use crate::store::now_ms;

/// Workflow kinds hosted by this runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    StudySession,
    QuizGeneration,
}

/// Run lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One checkpointed step output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub output: Value,
    /// Epoch milliseconds
    pub completed_at: i64,
}

/// Durable record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub kind: WorkflowKind,
    pub user_id: String,
    /// Original trigger payload, for resumption
    pub params: Value,
    pub steps: Vec<StepRecord>,
    pub status: RunStatus,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl RunRecord {
    /// Start a fresh run with a random id
    pub fn new(kind: WorkflowKind, user_id: &str, params: Value) -> Self {
        RunRecord {
            id: Uuid::new_v4().to_string(),
            kind,
            user_id: user_id.to_string(),
            params,
            steps: Vec::new(),
            status: RunStatus::Running,
            created_at: now_ms(),
        }
    }

    /// Output of a completed step, if checkpointed
    pub fn step_output(&self, name: &str) -> Option<&Value> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| &step.output)
    }
}

/// Disk journal of workflow runs, one JSON document per run id
pub struct WorkflowJournal {
    runs_dir: PathBuf,
}

impl WorkflowJournal {
    pub fn new(runs_dir: PathBuf) -> AnyhowResult<Self> {
        if !runs_dir.exists() {
            fs::create_dir_all(&runs_dir).context("Failed to create workflow runs directory")?;
        }
        Ok(Self { runs_dir })
    }

    /// Persist the run, replacing any previous document
    pub fn save(&self, record: &RunRecord) -> AnyhowResult<()> {
        let path = self.run_path(&record.id);
        let tmp_path = path.with_extension("json.tmp");

        let json =
            serde_json::to_string_pretty(record).context("Failed to serialize run record")?;
        fs::write(&tmp_path, json).context("Failed to write run record")?;
        fs::rename(&tmp_path, &path).context("Failed to move run record into place")?;

        Ok(())
    }

    /// Load a run by id
    pub fn load(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.run_path(run_id);
        if !path.exists() {
            return Err(StudyError::RunNotFound(run_id.to_string()));
        }

        let json = fs::read_to_string(&path)?;
        let record: RunRecord = serde_json::from_str(&json)?;
        Ok(record)
    }

    /// Ids of runs still marked running (restart recovery)
    pub fn unfinished_runs(&self) -> AnyhowResult<Vec<String>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.runs_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(id) = filename
                .strip_prefix("run_")
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };

            if let Ok(record) = self.load(id) {
                if record.status == RunStatus::Running {
                    ids.push(record.id);
                }
            }
        }

        Ok(ids)
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("run_{}.json", run_id))
    }
}

/// Execution context threading a run record through its steps
pub struct RunContext<'a> {
    journal: &'a WorkflowJournal,
    record: RunRecord,
}

impl<'a> RunContext<'a> {
    pub fn new(journal: &'a WorkflowJournal, record: RunRecord) -> Self {
        Self { journal, record }
    }

    pub fn run_id(&self) -> &str {
        &self.record.id
    }

    /// Execute one named step, or replay its checkpointed output
    ///
    /// The output is journaled before this returns, so a later crash resumes
    /// after this step rather than inside it.
    pub async fn step<T, F, Fut>(&mut self, name: &str, body: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(output) = self.record.step_output(name) {
            debug!(run_id = %self.record.id, step = name, "replaying checkpointed step");
            return Ok(serde_json::from_value(output.clone())?);
        }

        let value = body().await?;

        self.record.steps.push(StepRecord {
            name: name.to_string(),
            output: serde_json::to_value(&value)?,
            completed_at: now_ms(),
        });
        self.journal.save(&self.record)?;

        debug!(run_id = %self.record.id, step = name, "step complete");
        Ok(value)
    }

    /// Suspend until the given epoch-ms timestamp
    ///
    /// The timestamp comes from a checkpointed step, so a resumed run sleeps
    /// only the remainder (or not at all once the moment has passed).
    pub async fn wait_until(&self, resume_at: i64) {
        let remaining = resume_at - now_ms();
        if remaining > 0 {
            debug!(run_id = %self.record.id, remaining_ms = remaining, "suspending run");
            tokio::time::sleep(Duration::from_millis(remaining as u64)).await;
        }
    }

    /// Mark the run finished and journal the final status
    pub fn finish(mut self) -> Result<RunRecord> {
        self.record.status = RunStatus::Completed;
        self.journal.save(&self.record)?;
        info!(run_id = %self.record.id, kind = ?self.record.kind, "workflow run completed");
        Ok(self.record)
    }

    /// Mark the run failed and journal the final status
    pub fn fail(mut self) -> Result<RunRecord> {
        self.record.status = RunStatus::Failed;
        self.journal.save(&self.record)?;
        Ok(self.record)
    }
}
