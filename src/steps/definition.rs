//! Step definitions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::operation::{Metrics, Operation};

/// A unit of work within a phase.
///
/// Steps are built once from configuration and never mutated during a run.
/// Cloning is cheap: the operation is shared behind an `Arc`.
#[derive(Clone)]
pub struct Step {
    /// Identifier, unique within the owning phase.
    pub id: String,

    /// Human-readable label.
    pub name: String,

    /// The work this step delegates to.
    pub operation: Arc<dyn Operation>,

    /// Whether transient failures may be retried.
    pub retryable: bool,

    /// Whether re-running after a partial failure is safe.
    ///
    /// Operator guidance only; the runner does not act on it.
    pub idempotent: bool,

    /// Per-attempt timeout (falls back to the run default).
    pub timeout: Option<Duration>,

    /// Skip this step without running it.
    pub skip: bool,

    /// Parameters handed to the operation on every attempt.
    pub params: Metrics,
}

impl Step {
    /// Create a retryable step whose name equals its id.
    pub fn new(id: impl Into<String>, operation: impl Operation + 'static) -> Self {
        Self::from_shared(id, Arc::new(operation))
    }

    /// Create a step around an already shared operation.
    pub fn from_shared(id: impl Into<String>, operation: Arc<dyn Operation>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            operation,
            retryable: true,
            idempotent: false,
            timeout: None,
            skip: false,
            params: Metrics::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set whether transient failures are retried.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Mark the step as safe to re-run.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Set a per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip this step.
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Set operation parameters.
    pub fn with_params(mut self, params: Metrics) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("operation", &self.operation.describe())
            .field("retryable", &self.retryable)
            .field("idempotent", &self.idempotent)
            .field("timeout", &self.timeout)
            .field("skip", &self.skip)
            .finish()
    }
}
