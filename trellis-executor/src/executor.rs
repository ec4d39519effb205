//! The run executor - drives validate, sort, and the sequential step loop.
//!
//! Steps execute one at a time in deterministic topological order. The
//! first failed step halts the run: every later step is marked skipped and
//! the run finishes FAILED. Observers see terminal step transitions in
//! order, each delivered before the next step begins.

use crate::checks::run_checks;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::events::{NoopObserver, RunObserver};
use crate::scheduler::WorkflowGraph;
use crate::state::StateManager;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use trellis_core::error::EngineError;
use trellis_core::registry::ToolRegistry;
use trellis_core::run::{Run, RunStatus, StepResult, StepStatus};
use trellis_core::tool::{ToolConfig, ToolDefinition};
use trellis_core::workflow::validation::{validate, ValidationError};
use trellis_core::workflow::{CheckTarget, Step, Workflow};
use uuid::Uuid;

/// Errors that abort `execute` before or outside of step execution.
///
/// Step-level failures never surface here; they are recorded on the run.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The workflow failed validation; nothing was executed.
    #[error("workflow validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A bug in the engine (e.g. the scheduler failed on a validated graph).
    #[error("internal executor error: {0}")]
    Internal(String),
}

/// Configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// HTTP dispatch settings.
    pub dispatch: DispatchConfig,
}

impl EngineConfig {
    /// Create configuration from `TRELLIS_`-prefixed environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            dispatch: DispatchConfig::from_env(),
        }
    }
}

/// The workflow execution engine.
///
/// Generic over the observer so callers choose how to watch progress; use
/// [`Engine::new`] for no observation or [`Engine::with_observer`] to
/// stream step results.
pub struct Engine<N: RunObserver = NoopObserver> {
    dispatcher: Dispatcher,
    observer: N,
}

impl Engine<NoopObserver> {
    /// Create an engine that discards progress notifications.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_observer(config, NoopObserver)
    }
}

impl<N: RunObserver> Engine<N> {
    /// Create an engine with a custom observer.
    pub fn with_observer(config: EngineConfig, observer: N) -> Result<Self, EngineError> {
        Ok(Self {
            dispatcher: Dispatcher::new(config.dispatch)?,
            observer,
        })
    }

    /// Execute a workflow.
    ///
    /// Validates (and normalises a private copy of) the workflow, orders the
    /// steps, then runs them sequentially, resolving each step's inputs
    /// against user inputs and completed outputs. Returns the final
    /// [`Run`]; step-level failures are recorded on it, never raised.
    ///
    /// The `cancel` token is checked between steps and after each HTTP call
    /// returns; in-flight calls are never aborted beyond the per-call
    /// timeout.
    #[instrument(skip_all, fields(workflow_id = %workflow.id))]
    pub async fn execute(
        &self,
        workflow: &Workflow,
        tools: &ToolRegistry,
        user_inputs: Value,
        tool_configs: &HashMap<String, ToolConfig>,
        cancel: CancellationToken,
    ) -> Result<Run, ExecuteError> {
        // Validation mutates the edge set; normalise a clone so the
        // caller's workflow is untouched.
        let mut workflow = workflow.clone();
        validate(&mut workflow, tools)?;

        let order = WorkflowGraph::from_workflow(&workflow)
            .topological_sort()
            .map_err(|e| ExecuteError::Internal(e.to_string()))?;

        let mut state = StateManager::new(user_inputs.clone());
        let mut run = Run::new(
            Uuid::new_v4().to_string(),
            &workflow.id,
            user_inputs,
            order.iter().cloned(),
        );
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        tracing::debug!(run_id = %run.id, steps = order.len(), "run started");

        let empty_config = ToolConfig::new();

        for step_id in &order {
            if cancel.is_cancelled() {
                tracing::debug!(run_id = %run.id, "cancellation observed between steps");
                break;
            }

            let step = workflow
                .get_step(step_id)
                .ok_or_else(|| ExecuteError::Internal(format!("step '{step_id}' not in workflow")))?;
            let tool = tools
                .get(&step.tool_id)
                .ok_or_else(|| ExecuteError::Internal(format!("tool '{}' vanished", step.tool_id)))?;
            let tool_config = tool_configs.get(&step.tool_id).unwrap_or(&empty_config);

            set_running(&mut run, step_id);

            let (outcome, warnings) = self.execute_step(step, tool, &mut state, tool_config).await;

            // A cancellation that raced the HTTP call fails the in-flight
            // step regardless of the call's outcome.
            let outcome = if cancel.is_cancelled() {
                Err(EngineError::Cancelled)
            } else {
                outcome
            };

            let failed = outcome.is_err();
            finish_step(&mut run, step_id, outcome, warnings);
            self.notify(&run.step_results[step_id]);

            if failed {
                break;
            }
        }

        // Anything still pending was never attempted.
        for step_id in &order {
            let result = run
                .step_results
                .get_mut(step_id)
                .ok_or_else(|| ExecuteError::Internal(format!("missing result for '{step_id}'")))?;
            if result.status == StepStatus::Pending {
                result.status = StepStatus::Skipped;
                result.finished_at = Some(Utc::now());
                self.notify(&run.step_results[step_id]);
            }
        }

        run.finished_at = Some(Utc::now());
        run.status = if run.all_steps_succeeded() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        tracing::debug!(run_id = %run.id, status = ?run.status, "run finished");
        Ok(run)
    }

    /// Resolve inputs, run checks, dispatch, and record the output.
    ///
    /// Warnings are returned alongside the outcome so they reach the step
    /// result on failure too.
    async fn execute_step(
        &self,
        step: &Step,
        tool: &ToolDefinition,
        state: &mut StateManager,
        tool_config: &ToolConfig,
    ) -> (Result<Value, EngineError>, Vec<String>) {
        let mut warnings = Vec::new();

        let resolved = match state.resolve(&step.input_mapping) {
            Ok(resolved) => resolved,
            Err(e) => return (Err(e), warnings),
        };

        let input_checks = run_checks(
            &Value::Object(resolved.clone()),
            &step.checks,
            CheckTarget::Input,
        );
        warnings.extend(input_checks.warnings.clone());
        if input_checks.has_errors() {
            return (
                Err(EngineError::CheckFailed {
                    stage: "input".to_string(),
                    cause: input_checks.errors.join("; "),
                }),
                warnings,
            );
        }

        let output = match self.dispatcher.call(tool, resolved, tool_config).await {
            Ok(output) => output,
            Err(e) => return (Err(e), warnings),
        };

        let output_checks = run_checks(&output, &step.checks, CheckTarget::Output);
        warnings.extend(output_checks.warnings.clone());
        if output_checks.has_errors() {
            return (
                Err(EngineError::CheckFailed {
                    stage: "output".to_string(),
                    cause: output_checks.errors.join("; "),
                }),
                warnings,
            );
        }

        state.record(&step.id, output.clone());
        (Ok(output), warnings)
    }

    /// Deliver a terminal step result to the observer. Observer panics are
    /// logged and swallowed; they must not affect the run.
    fn notify(&self, result: &StepResult) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| {
            self.observer.on_step_complete(result);
        })) {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".to_string());
            tracing::warn!(step_id = %result.step_id, %message, "step observer panicked");
        }
    }
}

fn set_running(run: &mut Run, step_id: &str) {
    if let Some(result) = run.step_results.get_mut(step_id) {
        result.status = StepStatus::Running;
        result.started_at = Some(Utc::now());
    }
}

fn finish_step(
    run: &mut Run,
    step_id: &str,
    outcome: Result<Value, EngineError>,
    warnings: Vec<String>,
) {
    let Some(result) = run.step_results.get_mut(step_id) else {
        return;
    };
    result.warnings = warnings;
    result.finished_at = Some(Utc::now());
    match outcome {
        Ok(output) => {
            result.status = StepStatus::Success;
            result.output = Some(output);
        }
        Err(error) => {
            result.status = StepStatus::Failed;
            result.error_kind = Some(error.kind().to_string());
            result.error = Some(error.to_string());
        }
    }
}
