//! Pipeline execution orchestration.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::steps::{Step, StepResult};

use super::cancel::CancellationToken;
use super::dependency::DependencyGraph;
use super::phase::{Phase, PhaseResult, PhaseStatus};
use super::pool::{StepContext, WorkerPool};
use super::report::{ExecutionReport, NotRunReason, RunRecorder, Termination};
use super::retry::RetryPolicy;

/// Default number of worker threads.
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Default time in-flight steps get to finish after an interrupt.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// What the runner does after a phase with failed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop after the first failed phase; later phases are not run.
    #[default]
    #[serde(rename = "halt")]
    HaltOnFirstFailure,
    /// Keep going; phases with failures are PartiallyFailed.
    #[serde(rename = "continue")]
    ContinueOnFailure,
}

/// A validated set of phases in execution order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: Option<String>,
    phases: Vec<Phase>,
    graph: DependencyGraph,
}

impl Pipeline {
    /// Validate phase definitions and fix their execution order.
    ///
    /// Rejects duplicate step ids within a phase, then builds the dependency
    /// graph (duplicate phases, unknown dependencies and cycles).
    pub fn new(phases: Vec<Phase>) -> Result<Self> {
        for phase in &phases {
            let mut seen = HashSet::new();
            for step in &phase.steps {
                if !seen.insert(step.id.as_str()) {
                    return Err(PipelineError::DuplicateStep {
                        phase: phase.id.clone(),
                        step: step.id.clone(),
                    });
                }
            }
        }

        let graph = DependencyGraph::from_phases(&phases)?;
        let phases = graph.order_phases(phases);

        Ok(Self {
            name: None,
            phases,
            graph,
        })
    }

    /// Set a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Phases in execution order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Look up a phase by id.
    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Total number of steps across all phases.
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }
}

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Worker pool size.
    pub thread_count: usize,
    /// Retry policy applied to every step.
    pub retry: RetryPolicy,
    /// Halt or continue after a failed phase.
    pub failure_policy: FailurePolicy,
    /// Probe instead of execute.
    pub dry_run: bool,
    /// Phases to skip.
    pub skip_phases: HashSet<String>,
    /// Run only this phase; every other phase is skipped.
    pub only_phase: Option<String>,
    /// Steps to skip, keyed by phase id.
    pub skip_steps: HashMap<String, HashSet<String>>,
    /// Per-attempt timeout for steps without their own.
    pub step_timeout: Option<Duration>,
    /// Time in-flight steps get after cancellation.
    pub grace_period: Duration,
    /// Fixed run id (generated when `None`).
    pub run_id: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
            dry_run: false,
            skip_phases: HashSet::new(),
            only_phase: None,
            skip_steps: HashMap::new(),
            step_timeout: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            run_id: None,
        }
    }
}

impl RunOptions {
    /// Set the worker pool size.
    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Skip a phase.
    pub fn skip_phase(mut self, phase: impl Into<String>) -> Self {
        self.skip_phases.insert(phase.into());
        self
    }

    /// Run only one phase.
    pub fn only_phase(mut self, phase: impl Into<String>) -> Self {
        self.only_phase = Some(phase.into());
        self
    }

    /// Skip a single step.
    pub fn skip_step(mut self, phase: impl Into<String>, step: impl Into<String>) -> Self {
        self.skip_steps
            .entry(phase.into())
            .or_default()
            .insert(step.into());
        self
    }

    /// Set the default per-attempt timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Set the cancellation grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Use a fixed run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    fn is_phase_skipped(&self, phase: &str) -> bool {
        if self.skip_phases.contains(phase) {
            return true;
        }
        matches!(&self.only_phase, Some(only) if only != phase)
    }

    fn is_step_skipped(&self, phase: &str, step: &str) -> bool {
        self.skip_steps
            .get(phase)
            .is_some_and(|steps| steps.contains(step))
    }
}

/// Runner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Not started yet.
    Pending,
    /// Executing the phase at this index of the execution order.
    Running { phase_index: usize },
    /// Finished with every scheduled phase run and nothing failed.
    Succeeded,
    /// Finished with failures.
    Failed,
    /// Stopped early.
    Aborted,
}

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// The run is about to start.
    RunStarting {
        run_id: &'a str,
        phases: usize,
        steps: usize,
    },
    /// A phase is about to start.
    PhaseStarting {
        phase: &'a Phase,
        index: usize,
        total: usize,
    },
    /// A phase was skipped by configuration.
    PhaseSkipped { phase: &'a Phase },
    /// A phase will not run.
    PhaseNotRun {
        phase: &'a Phase,
        reason: &'a NotRunReason,
    },
    /// A step finished.
    StepFinished {
        phase_id: &'a str,
        result: &'a StepResult,
        completed: usize,
        total: usize,
    },
    /// A phase finished.
    PhaseFinished { result: &'a PhaseResult },
}

/// Generate a run id: `run_<utc millis>_<16 hex chars>`.
pub fn generate_run_id() -> String {
    let suffix: [u8; 8] = rand::random();
    format!(
        "run_{}_{}",
        Utc::now().timestamp_millis(),
        hex::encode(suffix)
    )
}

/// Orchestrates the execution of a pipeline.
pub struct PipelineRunner<'a> {
    pipeline: &'a Pipeline,
    options: RunOptions,
    cancel: CancellationToken,
    state: RunnerState,
}

impl<'a> PipelineRunner<'a> {
    /// Create a runner, checking that every phase and step named in the
    /// options exists.
    pub fn new(pipeline: &'a Pipeline, options: RunOptions) -> Result<Self> {
        if options.thread_count == 0 {
            return Err(PipelineError::ConfigValidationError {
                message: "thread count must be at least 1".to_string(),
            });
        }

        let named = options.skip_phases.iter().chain(options.only_phase.iter());
        for phase in named {
            if pipeline.phase(phase).is_none() {
                return Err(PipelineError::UnknownPhase {
                    phase: phase.clone(),
                });
            }
        }

        for (phase_id, steps) in &options.skip_steps {
            let phase = pipeline
                .phase(phase_id)
                .ok_or_else(|| PipelineError::UnknownPhase {
                    phase: phase_id.clone(),
                })?;
            for step in steps {
                if !phase.steps.iter().any(|s| &s.id == step) {
                    return Err(PipelineError::ConfigValidationError {
                        message: format!("Phase '{}' has no step '{}'", phase_id, step),
                    });
                }
            }
        }

        Ok(Self {
            pipeline,
            options,
            cancel: CancellationToken::new(),
            state: RunnerState::Pending,
        })
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this run when fired.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run the pipeline.
    pub fn run(&mut self) -> Result<ExecutionReport> {
        self.run_with_progress(|_| {})
    }

    /// Run the pipeline with a progress callback.
    ///
    /// The callback runs on the calling thread; step events arrive in
    /// completion order.
    pub fn run_with_progress(
        &mut self,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> Result<ExecutionReport> {
        let pipeline = self.pipeline;
        let options = &self.options;
        let run_id = options.run_id.clone().unwrap_or_else(generate_run_id);
        let pool = WorkerPool::new(options.thread_count)?;
        let mut recorder = RunRecorder::start(&run_id, options.dry_run);

        let total_phases = pipeline.phases().len();
        let total_steps: usize = pipeline
            .phases()
            .iter()
            .filter(|p| !options.is_phase_skipped(&p.id))
            .map(|p| p.steps.len())
            .sum();

        info!(
            run_id = %run_id,
            phases = total_phases,
            steps = total_steps,
            threads = options.thread_count,
            dry_run = options.dry_run,
            "Starting pipeline run"
        );
        on_progress(RunProgress::RunStarting {
            run_id: &run_id,
            phases: total_phases,
            steps: total_steps,
        });

        let mut satisfied: HashSet<String> = HashSet::new();
        let mut halted_after: Option<String> = None;
        let mut stopped_early = false;

        for (index, phase) in pipeline.phases().iter().enumerate() {
            let blocked = if let Some(after) = &halted_after {
                stopped_early = true;
                Some(NotRunReason::Halted {
                    after: after.clone(),
                })
            } else if self.cancel.is_cancelled() {
                stopped_early = true;
                Some(NotRunReason::Cancelled)
            } else {
                None
            };
            if let Some(reason) = blocked {
                on_progress(RunProgress::PhaseNotRun {
                    phase,
                    reason: &reason,
                });
                recorder.phase_not_run(phase, reason);
                continue;
            }

            if options.is_phase_skipped(&phase.id) {
                info!(phase = %phase.id, "Skipping phase");
                on_progress(RunProgress::PhaseSkipped { phase });
                satisfied.insert(phase.id.clone());
                recorder.phase_finished(PhaseResult::skipped(phase));
                continue;
            }

            let unsatisfied = pipeline.graph.unsatisfied_dependency(&phase.id, &satisfied);
            if let Some(dependency) = unsatisfied {
                warn!(
                    phase = %phase.id,
                    dependency = %dependency,
                    "Phase not run: dependency did not succeed"
                );
                let reason = NotRunReason::DependencyNotSatisfied {
                    dependency: dependency.to_string(),
                };
                on_progress(RunProgress::PhaseNotRun {
                    phase,
                    reason: &reason,
                });
                recorder.phase_not_run(phase, reason);
                continue;
            }

            self.state = RunnerState::Running { phase_index: index };
            debug!(state = ?self.state, "Runner state changed");
            info!(
                phase = %phase.id,
                steps = phase.steps.len(),
                "Starting phase {}/{}: {}",
                index + 1,
                total_phases,
                phase.name
            );
            on_progress(RunProgress::PhaseStarting {
                phase,
                index,
                total: total_phases,
            });

            let steps: Vec<Step> = phase
                .steps
                .iter()
                .map(|step| {
                    let mut step = step.clone();
                    if options.is_step_skipped(&phase.id, &step.id) {
                        step.skip = true;
                    }
                    step
                })
                .collect();

            let ctx = StepContext {
                run_id: run_id.clone(),
                phase_id: phase.id.clone(),
                dry_run: options.dry_run,
                retry: options.retry.clone(),
                default_timeout: options.step_timeout,
                grace_period: options.grace_period,
                cancel: self.cancel.clone(),
            };

            let started_at = Utc::now();
            let results = pool.run_phase_steps(&steps, phase.max_parallel, &ctx, |result| {
                on_progress(RunProgress::StepFinished {
                    phase_id: &phase.id,
                    result,
                    completed: pool.completed(),
                    total: total_steps,
                })
            });

            let result = PhaseResult::from_steps(phase, results, options.failure_policy, started_at);
            let status = result.status();
            info!(
                phase = %phase.id,
                status = %status,
                duration_ms = result.duration().as_millis() as u64,
                "Phase finished"
            );
            on_progress(RunProgress::PhaseFinished { result: &result });
            if status.is_satisfied() {
                satisfied.insert(phase.id.clone());
            }
            recorder.phase_finished(result);

            if self.cancel.is_cancelled() {
                stopped_early = true;
            } else if status == PhaseStatus::Failed {
                warn!(phase = %phase.id, "Halting run after failed phase");
                halted_after = Some(phase.id.clone());
            }
        }

        // A failing final phase halts nothing, so the run is Failed, not Aborted.
        let report = recorder.finish(stopped_early);
        self.state = match report.termination() {
            Termination::Succeeded => RunnerState::Succeeded,
            Termination::Failed => RunnerState::Failed,
            Termination::Aborted => RunnerState::Aborted,
        };
        debug!(state = ?self.state, "Runner state changed");
        info!(
            run_id = %run_id,
            status = %report.overall_status(),
            duration_ms = report.total_duration().as_millis() as u64,
            "Pipeline run finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::report::OverallStatus;
    use crate::steps::{from_fn, Metrics, OperationContext, OperationError, StepStatus};
    use std::sync::{Arc, Mutex};

    fn recording_step(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Step {
        let log = Arc::clone(log);
        let label = id.to_string();
        Step::new(
            id,
            from_fn("record", move |ctx: &OperationContext| {
                log.lock()
                    .unwrap()
                    .push(format!("{}.{}", ctx.phase_id, label));
                Ok(Metrics::new())
            }),
        )
    }

    fn failing_step(id: &str) -> Step {
        Step::new(
            id,
            from_fn("fail", |_: &OperationContext| {
                Err(OperationError::fatal("schema mismatch"))
            }),
        )
    }

    fn fast_options() -> RunOptions {
        RunOptions::default()
            .with_threads(2)
            .with_retry(RetryPolicy::new(
                2,
                Duration::from_millis(1),
                Duration::from_millis(2),
            ))
            .with_run_id("run_test")
    }

    #[test]
    fn pipeline_orders_phases_topologically() {
        let pipeline = Pipeline::new(vec![
            Phase::new("b").depends_on("a"),
            Phase::new("a"),
        ])
        .unwrap();
        let ids: Vec<&str> = pipeline.phases().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_step_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = Pipeline::new(vec![Phase::new("a")
            .with_step(recording_step("x", &log))
            .with_step(recording_step("x", &log))]);
        assert!(matches!(result, Err(PipelineError::DuplicateStep { .. })));
    }

    #[test]
    fn unknown_skip_phase_rejected() {
        let pipeline = Pipeline::new(vec![Phase::new("a")]).unwrap();
        let result = PipelineRunner::new(&pipeline, fast_options().skip_phase("nope"));
        assert!(matches!(result, Err(PipelineError::UnknownPhase { .. })));
    }

    #[test]
    fn unknown_only_phase_rejected() {
        let pipeline = Pipeline::new(vec![Phase::new("a")]).unwrap();
        let result = PipelineRunner::new(&pipeline, fast_options().only_phase("nope"));
        assert!(matches!(result, Err(PipelineError::UnknownPhase { .. })));
    }

    #[test]
    fn unknown_skip_step_rejected() {
        let pipeline = Pipeline::new(vec![Phase::new("a")]).unwrap();
        let result = PipelineRunner::new(&pipeline, fast_options().skip_step("a", "missing"));
        assert!(matches!(
            result,
            Err(PipelineError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn runs_phases_in_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("sync")
                .depends_on("export")
                .with_step(recording_step("push", &log)),
            Phase::new("export").with_step(recording_step("dump", &log)),
        ])
        .unwrap();

        let mut runner = PipelineRunner::new(&pipeline, fast_options()).unwrap();
        assert_eq!(runner.state(), RunnerState::Pending);
        let report = runner.run().unwrap();

        assert_eq!(report.overall_status(), OverallStatus::Succeeded);
        assert_eq!(runner.state(), RunnerState::Succeeded);
        assert_eq!(*log.lock().unwrap(), vec!["export.dump", "sync.push"]);
        assert_eq!(report.run_id(), "run_test");
    }

    #[test]
    fn halt_policy_stops_after_failed_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("a").with_step(failing_step("x")),
            Phase::new("b").with_step(recording_step("y", &log)),
        ])
        .unwrap();

        let mut runner = PipelineRunner::new(&pipeline, fast_options()).unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.overall_status(), OverallStatus::Failed);
        assert_eq!(report.termination(), Termination::Aborted);
        assert_eq!(runner.state(), RunnerState::Aborted);
        assert!(report.phase("b").is_none());
        assert_eq!(report.not_run()[0].phase_id, "b");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_last_phase_is_failed_not_aborted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("a").with_step(recording_step("x", &log)),
            Phase::new("b").depends_on("a").with_step(failing_step("y")),
        ])
        .unwrap();

        let mut runner = PipelineRunner::new(&pipeline, fast_options()).unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.overall_status(), OverallStatus::Failed);
        assert!(report.not_run().is_empty());
        assert_eq!(report.termination(), Termination::Failed);
        assert_eq!(runner.state(), RunnerState::Failed);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn continue_policy_runs_independent_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("a")
                .with_step(failing_step("x"))
                .with_step(recording_step("ok", &log)),
            Phase::new("b").with_step(recording_step("y", &log)),
            Phase::new("c")
                .depends_on("a")
                .with_step(recording_step("z", &log)),
        ])
        .unwrap();

        let options = fast_options().with_failure_policy(FailurePolicy::ContinueOnFailure);
        let report = PipelineRunner::new(&pipeline, options)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.phase("a").unwrap().status(), PhaseStatus::PartiallyFailed);
        assert_eq!(report.phase("b").unwrap().status(), PhaseStatus::Succeeded);
        assert!(report.phase("c").is_none());
        assert_eq!(
            report.not_run()[0].reason,
            NotRunReason::DependencyNotSatisfied {
                dependency: "a".to_string()
            }
        );
        assert_eq!(report.termination(), Termination::Failed);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn skipped_dependency_is_satisfied() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("a").with_step(recording_step("x", &log)),
            Phase::new("b")
                .depends_on("a")
                .with_step(recording_step("y", &log)),
        ])
        .unwrap();

        let report = PipelineRunner::new(&pipeline, fast_options().skip_phase("a"))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.phase("a").unwrap().status(), PhaseStatus::Skipped);
        assert_eq!(report.phase("b").unwrap().status(), PhaseStatus::Succeeded);
        assert_eq!(*log.lock().unwrap(), vec!["b.y"]);
    }

    #[test]
    fn only_phase_skips_every_other_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Phase::new("a").with_step(recording_step("x", &log)),
            Phase::new("b").with_step(recording_step("y", &log)),
        ])
        .unwrap();

        let report = PipelineRunner::new(&pipeline, fast_options().only_phase("b"))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.phase("a").unwrap().status(), PhaseStatus::Skipped);
        assert_eq!(*log.lock().unwrap(), vec!["b.y"]);
    }

    #[test]
    fn skip_step_marks_only_that_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![Phase::new("a")
            .with_step(recording_step("x", &log))
            .with_step(recording_step("y", &log))])
        .unwrap();

        let report = PipelineRunner::new(&pipeline, fast_options().skip_step("a", "y"))
            .unwrap()
            .run()
            .unwrap();

        let steps = report.phase("a").unwrap().step_results();
        assert_eq!(steps[0].status(), StepStatus::Succeeded);
        assert_eq!(steps[1].status(), StepStatus::Skipped);
        assert_eq!(report.phase("a").unwrap().status(), PhaseStatus::Succeeded);
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![Phase::new("a").with_step(recording_step("x", &log))])
            .unwrap();

        let mut runner = PipelineRunner::new(&pipeline, fast_options()).unwrap();
        runner.cancellation_token().cancel();
        let report = runner.run().unwrap();

        assert_eq!(report.termination(), Termination::Aborted);
        assert_eq!(report.not_run()[0].reason, NotRunReason::Cancelled);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn progress_events_cover_every_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![Phase::new("a")
            .with_step(recording_step("x", &log))
            .with_step(recording_step("y", &log))])
        .unwrap();

        let mut completed = Vec::new();
        let mut phases_finished = 0;
        PipelineRunner::new(&pipeline, fast_options())
            .unwrap()
            .run_with_progress(|event| match event {
                RunProgress::StepFinished {
                    completed: n,
                    total,
                    ..
                } => {
                    assert_eq!(total, 2);
                    completed.push(n);
                }
                RunProgress::PhaseFinished { .. } => phases_finished += 1,
                _ => {}
            })
            .unwrap();

        completed.sort();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed.last(), Some(&2));
        assert_eq!(phases_finished, 1);
    }

    #[test]
    fn generated_run_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("run_"));
        assert_ne!(a, b);
        assert_eq!(a.rsplit('_').next().unwrap().len(), 16);
    }

    #[test]
    fn failure_policy_deserializes_from_short_names() {
        let halt: FailurePolicy = serde_json::from_str("\"halt\"").unwrap();
        let cont: FailurePolicy = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(halt, FailurePolicy::HaltOnFirstFailure);
        assert_eq!(cont, FailurePolicy::ContinueOnFailure);
    }
}
