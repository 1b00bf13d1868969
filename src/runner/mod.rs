//! Pipeline execution orchestration.
//!
//! Data flows leaves-first: a [`Pipeline`] validates phase definitions through
//! the [`DependencyGraph`], the [`PipelineRunner`] walks phases in topological
//! order and hands each phase's steps to the [`WorkerPool`], every step runs
//! through the [`RetryPolicy`], and a [`RunRecorder`] turns the phase outcomes
//! into an [`ExecutionReport`].

pub mod cancel;
pub mod dependency;
pub mod phase;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod retry;

pub use cancel::CancellationToken;
pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use phase::{Phase, PhaseResult, PhaseStatus};
pub use pipeline::{
    generate_run_id, FailurePolicy, Pipeline, PipelineRunner, RunOptions, RunProgress,
    RunnerState, DEFAULT_GRACE_PERIOD, DEFAULT_THREAD_COUNT,
};
pub use pool::{StepContext, WorkerPool};
pub use report::{
    ExecutionReport, FailedStep, NotRunPhase, NotRunReason, OverallStatus, RunRecorder, RunStats,
    Termination,
};
pub use retry::RetryPolicy;
