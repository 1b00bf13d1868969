//! Step outcome records.
//!
//! A [`StepResult`] is produced exactly once per step by the worker that ran
//! it, then handed to the aggregator. Fields are private so a result cannot be
//! edited after construction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{ErrorKind, Metrics, OperationError};

/// Metrics key holding the per-attempt timestamps.
pub const ATTEMPT_HISTORY_KEY: &str = "attempt_history";

/// Metrics key set on every dry-run probe result.
pub const DRY_RUN_KEY: &str = "dry_run";

/// Final status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The operation (or its dry-run probe) succeeded.
    Succeeded,

    /// Every permitted attempt failed, or the run was cancelled.
    Failed,

    /// Skipped by configuration.
    Skipped,
}

impl StepStatus {
    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Timestamps and outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    pub finished_at: DateTime<Utc>,
    /// Failure classification, `None` if the attempt succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    step_id: String,
    status: StepStatus,
    attempts: u32,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    metrics: Metrics,
    #[serde(default)]
    idempotent: bool,
}

impl StepResult {
    /// Create a success result.
    pub fn succeeded(
        step_id: &str,
        attempts: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        metrics: Metrics,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Succeeded,
            attempts,
            started_at,
            finished_at,
            error: None,
            metrics,
            idempotent: false,
        }
    }

    /// Create a failure result.
    pub fn failed(
        step_id: &str,
        attempts: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: OperationError,
        metrics: Metrics,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Failed,
            attempts,
            started_at,
            finished_at,
            error: Some(error),
            metrics,
            idempotent: false,
        }
    }

    /// Create a failure for a step that never started.
    pub fn not_started(step_id: &str, error: OperationError) -> Self {
        let now = Utc::now();
        Self::failed(step_id, 0, now, now, error, Metrics::new())
    }

    /// Create a skipped result.
    pub fn skipped(step_id: &str) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            attempts: 0,
            started_at: now,
            finished_at: now,
            error: None,
            metrics: Metrics::new(),
            idempotent: false,
        }
    }

    /// Record whether the step is safe to re-run.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Step identifier.
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Final status.
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the first attempt started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the last attempt finished.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// The last error, present iff the step failed.
    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    /// Whether the step is marked safe to re-run.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Operation metrics plus attempt bookkeeping.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Wall-clock time from first attempt start to last attempt end.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Whether this result came from a dry-run probe.
    pub fn is_dry_run(&self) -> bool {
        self.metrics
            .get(DRY_RUN_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let marker = self.status.display_char();
        match self.status {
            StepStatus::Succeeded if self.attempts > 1 => format!(
                "{} {} ({}, attempt {})",
                marker,
                self.step_id,
                format_duration(self.duration()),
                self.attempts
            ),
            StepStatus::Succeeded => format!(
                "{} {} ({})",
                marker,
                self.step_id,
                format_duration(self.duration())
            ),
            StepStatus::Skipped => format!("{} {} (skipped)", marker, self.step_id),
            StepStatus::Failed => {
                let error = self
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                format!(
                    "{} {} - {} after {} attempt(s)",
                    marker, self.step_id, error, self.attempts
                )
            }
        }
    }
}

/// Format a duration for humans: `350ms`, `4.2s`, `3m 10s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}
