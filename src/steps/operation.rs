//! The capability a step delegates its work to.
//!
//! The orchestration core never knows what a step does. Every unit of work is
//! an [`Operation`]: one call in, one uniform outcome out. Failures carry an
//! [`ErrorKind`] that decides whether the retry policy may try again.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::CancellationToken;

/// Opaque key/value metrics reported by an operation (record counts, paths, ...).
///
/// A `BTreeMap` keeps serialized reports stable between runs.
pub type Metrics = BTreeMap<String, serde_json::Value>;

/// Outcome of a single operation attempt.
pub type OperationOutcome = std::result::Result<Metrics, OperationError>;

/// How a failed attempt is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retry-eligible (lock contention, dropped connection, ...).
    Transient,
    /// Never retried.
    Fatal,
    /// The attempt exceeded its allotted time.
    Timeout,
    /// The run was interrupted before the step could finish.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Error information returned by a failed operation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Retry classification.
    pub kind: ErrorKind,

    /// Human-readable description.
    pub message: String,

    /// Optional machine-readable code (exit code, vendor error id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl OperationError {
    /// Create an error with an explicit classification.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// A retry-eligible failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// A failure that must not be retried.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// An attempt that ran past `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("attempt exceeded timeout of {}s", limit.as_secs_f64()),
        )
    }

    /// A step stopped by run cancellation.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}:{}] {}", self.kind, code, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for OperationError {}

/// Everything an operation is told about the attempt it is running.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Identifier of the pipeline run.
    pub run_id: String,
    /// Owning phase.
    pub phase_id: String,
    /// Step being executed.
    pub step_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether this is a dry-run probe.
    pub dry_run: bool,
    /// Step parameters from configuration.
    pub params: Metrics,
    /// Fires when this attempt times out or the run is interrupted.
    ///
    /// Long-running operations should poll it and stop early.
    pub cancel: CancellationToken,
}

/// A unit of work a step delegates to.
///
/// Implementations must be `Send + Sync`: the same operation may be probed or
/// executed from any worker thread, though never concurrently for one step.
pub trait Operation: Send + Sync {
    /// Perform the work.
    fn execute(&self, ctx: &OperationContext) -> OperationOutcome;

    /// Check preconditions without side effects. Used in dry-run mode.
    fn probe(&self, _ctx: &OperationContext) -> OperationOutcome {
        Ok(Metrics::new())
    }

    /// Short description for logs and plans.
    fn describe(&self) -> String {
        "operation".to_string()
    }
}

/// An [`Operation`] backed by a closure.
pub struct FnOperation<F> {
    func: F,
    description: String,
}

/// Wrap a closure as an [`Operation`].
///
/// The closure's probe is the default no-op.
pub fn from_fn<F>(description: impl Into<String>, func: F) -> FnOperation<F>
where
    F: Fn(&OperationContext) -> OperationOutcome + Send + Sync,
{
    FnOperation {
        func,
        description: description.into(),
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&OperationContext) -> OperationOutcome + Send + Sync,
{
    fn execute(&self, ctx: &OperationContext) -> OperationOutcome {
        (self.func)(ctx)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> OperationContext {
        OperationContext {
            run_id: "run_test".to_string(),
            phase_id: "export".to_string(),
            step_id: "points".to_string(),
            attempt: 1,
            dry_run: false,
            params: Metrics::new(),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn error_constructors_set_kind() {
        assert_eq!(OperationError::transient("x").kind, ErrorKind::Transient);
        assert_eq!(OperationError::fatal("x").kind, ErrorKind::Fatal);
        assert_eq!(
            OperationError::timeout(Duration::from_secs(2)).kind,
            ErrorKind::Timeout
        );
        assert_eq!(OperationError::cancelled("x").kind, ErrorKind::Cancelled);
    }

    #[test]
    fn error_display_includes_kind_and_code() {
        let err = OperationError::transient("lock held").with_code("75");
        let msg = err.to_string();
        assert!(msg.contains("transient"));
        assert!(msg.contains("75"));
        assert!(msg.contains("lock held"));
    }

    #[test]
    fn timeout_message_mentions_limit() {
        let err = OperationError::timeout(Duration::from_secs(3));
        assert!(err.message.contains("3s"));
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::Transient).unwrap();
        assert_eq!(json, "\"transient\"");
    }

    #[test]
    fn fn_operation_executes_closure() {
        let op = from_fn("count", |ctx: &OperationContext| {
            let mut metrics = Metrics::new();
            metrics.insert("step".to_string(), ctx.step_id.clone().into());
            Ok(metrics)
        });

        let metrics = op.execute(&context()).unwrap();
        assert_eq!(metrics["step"], "points");
        assert_eq!(op.describe(), "count");
    }

    #[test]
    fn default_probe_has_no_side_effects() {
        let op = from_fn("boom", |_: &OperationContext| {
            Err(OperationError::fatal("should not run"))
        });

        assert!(op.probe(&context()).unwrap().is_empty());
    }
}
