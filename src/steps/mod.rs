//! Step definitions, the operation capability, and step results.
//!
//! - [`Step`] - A unit of work owned by exactly one phase
//! - [`Operation`] - The opaque capability a step delegates to
//! - [`OperationError`] / [`ErrorKind`] - Failure classification for retries
//! - [`StepResult`] / [`StepStatus`] - Immutable per-step outcome
//!
//! # Example
//!
//! ```
//! use phaseline::steps::{from_fn, Metrics, OperationContext, Step};
//!
//! let step = Step::new(
//!     "export_points",
//!     from_fn("export points", |_ctx: &OperationContext| {
//!         let mut metrics = Metrics::new();
//!         metrics.insert("rows".to_string(), 42.into());
//!         Ok(metrics)
//!     }),
//! )
//! .idempotent(true);
//!
//! assert!(step.retryable);
//! ```

pub mod definition;
pub mod operation;
pub mod result;

pub use definition::Step;
pub use operation::{
    from_fn, ErrorKind, FnOperation, Metrics, Operation, OperationContext, OperationError,
    OperationOutcome,
};
pub use result::{
    format_duration, AttemptRecord, StepResult, StepStatus, ATTEMPT_HISTORY_KEY, DRY_RUN_KEY,
};
