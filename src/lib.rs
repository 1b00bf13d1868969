//! Phaseline - Dependency-aware batch pipeline runner.
//!
//! Phaseline runs scheduled batch jobs described as phases of steps. Phases
//! run in dependency order; steps inside a phase run in parallel on a
//! bounded worker pool, with retries, timeouts, and cooperative cancellation.
//! Every run produces an immutable [`ExecutionReport`](runner::ExecutionReport).
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Phase ordering, worker pool, retries and reporting
//! - [`shell`] - Shell command execution
//! - [`steps`] - Step definitions, operations, and results
//! - [`ui`] - Terminal output, progress, and run summaries
//!
//! # Example
//!
//! ```
//! use phaseline::runner::{OverallStatus, Phase, Pipeline, PipelineRunner, RunOptions};
//! use phaseline::steps::{from_fn, Metrics, OperationContext, Step};
//!
//! let noop = || from_fn("noop", |_ctx: &OperationContext| Ok(Metrics::new()));
//! let pipeline = Pipeline::new(vec![
//!     Phase::new("sync").depends_on("export").with_step(Step::new("push", noop())),
//!     Phase::new("export").with_step(Step::new("points", noop())),
//! ])
//! .unwrap();
//!
//! let mut runner = PipelineRunner::new(&pipeline, RunOptions::default()).unwrap();
//! let report = runner.run().unwrap();
//!
//! assert_eq!(report.overall_status(), OverallStatus::Succeeded);
//! assert_eq!(report.phase_results()[0].phase_id(), "export");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{PipelineError, Result};
