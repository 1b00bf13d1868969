//! Phase definitions and phase outcomes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::steps::{ErrorKind, Step, StepResult, StepStatus};

use super::pipeline::FailurePolicy;

/// A named node in the pipeline graph.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Unique, stable identifier.
    pub id: String,

    /// Human-readable label.
    pub name: String,

    /// Phases that must be Succeeded or Skipped before this one starts.
    pub depends_on: Vec<String>,

    /// Steps in declaration order.
    pub steps: Vec<Step>,

    /// Cap on concurrently running steps (bounded by the pool size).
    pub max_parallel: Option<usize>,
}

impl Phase {
    /// Create an empty phase whose name equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            depends_on: Vec::new(),
            steps: Vec::new(),
            max_parallel: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, phase: impl Into<String>) -> Self {
        self.depends_on.push(phase.into());
        self
    }

    /// Append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Cap concurrency for this phase.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }
}

/// Final status of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Every step succeeded or was skipped by configuration.
    Succeeded,
    /// Some steps failed and the run continues past failures.
    PartiallyFailed,
    /// Some steps failed and the run halts.
    Failed,
    /// The whole phase was skipped.
    Skipped,
}

impl PhaseStatus {
    /// Whether dependents may run after this phase.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PhaseStatus::Succeeded | PhaseStatus::Skipped)
    }

    /// Whether this phase counts as a failure in the overall status.
    pub fn is_failure(&self) -> bool {
        matches!(self, PhaseStatus::Failed | PhaseStatus::PartiallyFailed)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            PhaseStatus::Succeeded => '✓',
            PhaseStatus::PartiallyFailed => '!',
            PhaseStatus::Failed => '✗',
            PhaseStatus::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseStatus::Succeeded => "succeeded",
            PhaseStatus::PartiallyFailed => "partially failed",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Aggregated outcome of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    phase_id: String,
    name: String,
    status: PhaseStatus,
    step_results: Vec<StepResult>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl PhaseResult {
    /// Record a phase skipped by run configuration.
    pub fn skipped(phase: &Phase) -> Self {
        let now = Utc::now();
        Self {
            phase_id: phase.id.clone(),
            name: phase.name.clone(),
            status: PhaseStatus::Skipped,
            step_results: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Assemble a phase outcome from its step results (declaration order).
    ///
    /// A failed step makes the phase `Failed` under the halt policy and
    /// `PartiallyFailed` under the continue policy. A step stopped by
    /// cancellation always makes the phase `Failed`.
    pub fn from_steps(
        phase: &Phase,
        step_results: Vec<StepResult>,
        policy: FailurePolicy,
        started_at: DateTime<Utc>,
    ) -> Self {
        let failed: Vec<&StepResult> = step_results
            .iter()
            .filter(|r| r.status() == StepStatus::Failed)
            .collect();

        let cancelled = failed
            .iter()
            .any(|r| r.error().is_some_and(|e| e.kind == ErrorKind::Cancelled));

        let status = if failed.is_empty() {
            PhaseStatus::Succeeded
        } else if cancelled || policy == FailurePolicy::HaltOnFirstFailure {
            PhaseStatus::Failed
        } else {
            PhaseStatus::PartiallyFailed
        };

        Self {
            phase_id: phase.id.clone(),
            name: phase.name.clone(),
            status,
            step_results,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Phase identifier.
    pub fn phase_id(&self) -> &str {
        &self.phase_id
    }

    /// Phase display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final status.
    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    /// Step results in declaration order.
    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    /// When the phase started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the phase finished.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Wall-clock duration of the phase.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Failed steps in declaration order.
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results
            .iter()
            .filter(|r| r.status() == StepStatus::Failed)
    }
}
