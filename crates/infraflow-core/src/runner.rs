//! Step runner
//!
//! Executes an ordered list of steps against one `WorkflowContext`. When a
//! step fails, or the run is cancelled, every step that was started is
//! compensated in reverse order. Compensation is best effort: an undo fault
//! is recorded and the remaining undos still run. Steps are never retried.

use crate::context::{ErrorCollector, WorkflowContext};
use crate::error::StepFault;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum RunState {
    Pending,
    Running(usize),
    RollingBack,
    Completed,
    RolledBack,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running(i) => write!(f, "running[{}]", i),
            Self::RollingBack => write!(f, "rolling_back"),
            Self::Completed => write!(f, "completed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Result of a run handed back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: RunState,

    /// Step whose failure triggered compensation
    ///
    /// On cancellation this is the last step that started, or `None` when
    /// the run was cancelled before its first step.
    pub failed_step: Option<String>,

    /// Steps whose undo reported a fault
    pub undo_failures: Vec<String>,

    pub errors: ErrorCollector,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Ordered, fixed list of steps
pub struct Workflow {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn transition(&self, state: &mut RunState, next: RunState) {
        tracing::debug!(workflow = %self.name, "{} -> {}", state, next);
        *state = next;
    }

    pub async fn run(&self, ctx: &mut WorkflowContext) -> RunOutcome {
        let mut state = RunState::Pending;
        // Index of the step blamed for the failure, `None` when a
        // cancellation arrived before any step started
        let mut failure: Option<(Option<usize>, StepFault)> = None;
        let mut started = 0;

        tracing::info!(
            workflow = %self.name,
            infra = %ctx.databaseinfra.name,
            "Starting workflow with {} steps",
            self.steps.len()
        );

        for (index, step) in self.steps.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                failure = Some((index.checked_sub(1), StepFault::cancelled()));
                break;
            }

            self.transition(&mut state, RunState::Running(index));
            tracing::info!(workflow = %self.name, "Running step {}", step.name());
            started = index + 1;

            if let Err(fault) = step.apply(ctx).await {
                failure = Some((Some(index), fault));
                break;
            }
        }

        let Some((failed_index, fault)) = failure else {
            self.transition(&mut state, RunState::Completed);
            tracing::info!(workflow = %self.name, "Workflow completed");
            return RunOutcome {
                state,
                failed_step: None,
                undo_failures: Vec::new(),
                errors: ctx.exceptions.clone(),
            };
        };

        let failed_step = failed_index.map(|i| self.steps[i].name().to_string());
        let blamed = failed_step.as_deref().unwrap_or(&self.name);
        tracing::error!(workflow = %self.name, "Step {} failed: {}", blamed, fault);
        ctx.exceptions.record(blamed, &fault);

        self.transition(&mut state, RunState::RollingBack);
        let mut undo_failures = Vec::new();

        for step in self.steps[..started].iter().rev() {
            tracing::info!(workflow = %self.name, "Undoing step {}", step.name());
            if let Err(fault) = step.undo(ctx).await {
                let fault = fault.into_rollback();
                tracing::warn!(
                    workflow = %self.name,
                    "Undo of step {} failed: {}",
                    step.name(),
                    fault
                );
                ctx.exceptions.record(step.name(), &fault);
                undo_failures.push(step.name().to_string());
            }
        }

        self.transition(&mut state, RunState::RolledBack);
        RunOutcome {
            state,
            failed_step,
            undo_failures,
            errors: ctx.exceptions.clone(),
        }
    }
}
