//! Run records - one execution instance of a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, not yet started.
    Pending,
    /// Steps are executing.
    Running,
    /// Every step succeeded.
    Success,
    /// A step failed (or the run was cancelled).
    Failed,
}

/// Status of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Waiting for its turn.
    Pending,
    /// Currently executing.
    Running,
    /// Completed and produced an output.
    Success,
    /// Execution failed; `error` describes why.
    Failed,
    /// Never attempted because an earlier step failed.
    Skipped,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The step this result belongs to.
    pub step_id: String,

    /// Lifecycle status.
    pub status: StepStatus,

    /// The step's output, present after success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Short failure description, present after failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable failure kind (e.g. `dispatch`, `extraction`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Non-fatal check findings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// When execution began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the step reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepResult {
    /// Create a pending result for a step.
    pub fn pending(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            error_kind: None,
            warnings: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether this result has reached SUCCESS, FAILED, or SKIPPED.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// A single execution of a workflow with concrete user inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier.
    pub id: String,

    /// The workflow this run executes.
    pub workflow_id: String,

    /// Overall status.
    pub status: RunStatus,

    /// The inputs supplied when the run was started.
    #[serde(default)]
    pub user_inputs: Value,

    /// Per-step outcomes, keyed by step id.
    #[serde(default)]
    pub step_results: BTreeMap<String, StepResult>,

    /// When the run started executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a new run in PENDING with a pending result per step.
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        user_inputs: Value,
        step_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let step_results = step_ids
            .into_iter()
            .map(|sid| (sid.clone(), StepResult::pending(sid)))
            .collect();
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            status: RunStatus::Pending,
            user_inputs,
            step_results,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether every step result is SUCCESS.
    #[must_use]
    pub fn all_steps_succeeded(&self) -> bool {
        self.step_results
            .values()
            .all(|r| r.status == StepStatus::Success)
    }
}
