//! Execution report assembly.
//!
//! The runner is the sole writer of run state. It feeds every phase outcome
//! into a [`RunRecorder`], which produces the immutable [`ExecutionReport`]
//! once the run ends.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::steps::{StepResult, StepStatus};

use super::phase::{Phase, PhaseResult, PhaseStatus};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every phase succeeded or was skipped.
    Succeeded,
    /// At least one phase failed, partially failed, or did not run.
    Failed,
    /// A dry run in which every probe succeeded.
    DryRun,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OverallStatus::Succeeded => "succeeded",
            OverallStatus::Failed => "failed",
            OverallStatus::DryRun => "dry run",
        };
        write!(f, "{}", s)
    }
}

/// Terminal state of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every scheduled phase ran.
    Succeeded,
    /// The run completed but some phases failed or were blocked.
    Failed,
    /// The run stopped early (halt on failure, or interrupted).
    Aborted,
}

/// Why a phase never ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotRunReason {
    /// An earlier phase failed under the halt policy.
    Halted { after: String },
    /// The run was interrupted.
    Cancelled,
    /// A dependency finished without being satisfied.
    DependencyNotSatisfied { dependency: String },
}

impl std::fmt::Display for NotRunReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotRunReason::Halted { after } => write!(f, "halted after '{}' failed", after),
            NotRunReason::Cancelled => write!(f, "run cancelled"),
            NotRunReason::DependencyNotSatisfied { dependency } => {
                write!(f, "dependency '{}' did not succeed", dependency)
            }
        }
    }
}

/// A phase listed in the report but never executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotRunPhase {
    pub phase_id: String,
    pub name: String,
    #[serde(flatten)]
    pub reason: NotRunReason,
}

/// A failed step together with its owning phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub phase_id: String,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Summary counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub phases_total: usize,
    pub phases_succeeded: usize,
    pub phases_failed: usize,
    pub phases_skipped: usize,
    pub phases_not_run: usize,
    pub steps_total: usize,
    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    /// Percentage of executed steps that succeeded (skipped steps excluded).
    pub success_rate: f64,
}

impl RunStats {
    fn collect(phase_results: &[PhaseResult], not_run: &[NotRunPhase]) -> Self {
        let mut stats = RunStats {
            phases_total: phase_results.len() + not_run.len(),
            phases_not_run: not_run.len(),
            ..Default::default()
        };

        for phase in phase_results {
            match phase.status() {
                PhaseStatus::Succeeded => stats.phases_succeeded += 1,
                PhaseStatus::Failed | PhaseStatus::PartiallyFailed => stats.phases_failed += 1,
                PhaseStatus::Skipped => stats.phases_skipped += 1,
            }
            for step in phase.step_results() {
                stats.steps_total += 1;
                match step.status() {
                    StepStatus::Succeeded => stats.steps_succeeded += 1,
                    StepStatus::Failed => stats.steps_failed += 1,
                    StepStatus::Skipped => stats.steps_skipped += 1,
                }
            }
        }

        let executed = stats.steps_succeeded + stats.steps_failed;
        stats.success_rate = if executed == 0 {
            100.0
        } else {
            stats.steps_succeeded as f64 / executed as f64 * 100.0
        };

        stats
    }
}

/// Immutable summary of a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    total_duration_ms: u64,
    dry_run: bool,
    overall_status: OverallStatus,
    termination: Termination,
    phase_results: Vec<PhaseResult>,
    not_run: Vec<NotRunPhase>,
    failed_steps: Vec<FailedStep>,
    stats: RunStats,
}

impl ExecutionReport {
    /// Assemble a report from phase results alone (nothing left unrun).
    pub fn finalize(run_id: &str, phase_results: Vec<PhaseResult>, dry_run: bool) -> Self {
        let mut recorder = RunRecorder::start(run_id, dry_run);
        for result in phase_results {
            recorder.phase_finished(result);
        }
        recorder.finish(false)
    }

    /// Run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// When the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the run finished.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Wall-clock duration of the run.
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms)
    }

    /// Whether this was a dry run.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Overall status.
    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Terminal runner state.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Results of every phase that was executed or skipped, in execution order.
    pub fn phase_results(&self) -> &[PhaseResult] {
        &self.phase_results
    }

    /// Look up the result of one phase.
    pub fn phase(&self, phase_id: &str) -> Option<&PhaseResult> {
        self.phase_results.iter().find(|p| p.phase_id() == phase_id)
    }

    /// Phases that never ran, in the order they were scheduled.
    pub fn not_run(&self) -> &[NotRunPhase] {
        &self.not_run
    }

    /// Every failed step, in phase then step order.
    pub fn failed_steps(&self) -> &[FailedStep] {
        &self.failed_steps
    }

    /// Summary counts.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Whether the run counts as successful (Succeeded or DryRun).
    pub fn is_success(&self) -> bool {
        self.overall_status != OverallStatus::Failed
    }

    /// Process exit code for this report.
    ///
    /// 0 for Succeeded or DryRun, 2 when the run was aborted, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match (self.termination, self.overall_status) {
            (Termination::Aborted, _) => 2,
            (_, OverallStatus::Failed) => 1,
            _ => 0,
        }
    }

    /// Default report file name for this run, e.g. `phaseline_report_20240102_030405.json`.
    pub fn default_file_name(&self) -> String {
        format!(
            "phaseline_report_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| anyhow::anyhow!(e).into())
    }

    /// Write the report as JSON. A directory target gets the default file name.
    pub fn write_json(&self, target: &Path) -> Result<PathBuf> {
        let path = if target.is_dir() {
            target.join(self.default_file_name())
        } else {
            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            target.to_path_buf()
        };
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }
}

/// Collects phase outcomes during a run and produces the final report.
#[derive(Debug)]
pub struct RunRecorder {
    run_id: String,
    dry_run: bool,
    started_at: DateTime<Utc>,
    phase_results: Vec<PhaseResult>,
    not_run: Vec<NotRunPhase>,
}

impl RunRecorder {
    /// Start recording a run.
    pub fn start(run_id: &str, dry_run: bool) -> Self {
        Self {
            run_id: run_id.to_string(),
            dry_run,
            started_at: Utc::now(),
            phase_results: Vec::new(),
            not_run: Vec::new(),
        }
    }

    /// Record a phase that ran (or was skipped).
    pub fn phase_finished(&mut self, result: PhaseResult) {
        self.phase_results.push(result);
    }

    /// Record a phase that never ran.
    pub fn phase_not_run(&mut self, phase: &Phase, reason: NotRunReason) {
        self.not_run.push(NotRunPhase {
            phase_id: phase.id.clone(),
            name: phase.name.clone(),
            reason,
        });
    }

    /// Results recorded so far.
    pub fn phase_results(&self) -> &[PhaseResult] {
        &self.phase_results
    }

    /// Finish the run. `aborted` means the runner stopped early.
    pub fn finish(self, aborted: bool) -> ExecutionReport {
        let finished_at = Utc::now();

        let any_failed = self.phase_results.iter().any(|p| p.status().is_failure());
        let overall_status = if any_failed || !self.not_run.is_empty() {
            OverallStatus::Failed
        } else if self.dry_run {
            OverallStatus::DryRun
        } else {
            OverallStatus::Succeeded
        };

        let termination = if aborted {
            Termination::Aborted
        } else if overall_status == OverallStatus::Failed {
            Termination::Failed
        } else {
            Termination::Succeeded
        };

        let failed_steps = self
            .phase_results
            .iter()
            .flat_map(|phase| {
                phase.failed_steps().map(move |step| FailedStep {
                    phase_id: phase.phase_id().to_string(),
                    result: step.clone(),
                })
            })
            .collect();

        let stats = RunStats::collect(&self.phase_results, &self.not_run);

        ExecutionReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            total_duration_ms: (finished_at - self.started_at).num_milliseconds().max(0) as u64,
            dry_run: self.dry_run,
            overall_status,
            termination,
            phase_results: self.phase_results,
            not_run: self.not_run,
            failed_steps,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FailurePolicy;
    use crate::steps::{Metrics, OperationError};

    fn ok(id: &str) -> StepResult {
        let now = Utc::now();
        StepResult::succeeded(id, 1, now, now, Metrics::new())
    }

    fn failed(id: &str) -> StepResult {
        let now = Utc::now();
        StepResult::failed(id, 2, now, now, OperationError::fatal("boom"), Metrics::new())
    }

    fn phase_result(id: &str, steps: Vec<StepResult>, policy: FailurePolicy) -> PhaseResult {
        PhaseResult::from_steps(&Phase::new(id), steps, policy, Utc::now())
    }

    #[test]
    fn all_succeeded_is_succeeded() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result("a", vec![ok("x")], FailurePolicy::HaltOnFirstFailure)],
            false,
        );
        assert_eq!(report.overall_status(), OverallStatus::Succeeded);
        assert_eq!(report.termination(), Termination::Succeeded);
        assert_eq!(report.exit_code(), 0);
        assert!(report.failed_steps().is_empty());
    }

    #[test]
    fn dry_run_without_failures_is_dry_run() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result("a", vec![ok("x")], FailurePolicy::HaltOnFirstFailure)],
            true,
        );
        assert_eq!(report.overall_status(), OverallStatus::DryRun);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn partial_failure_fails_run() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![
                phase_result("a", vec![ok("x"), failed("y")], FailurePolicy::ContinueOnFailure),
                phase_result("b", vec![ok("z")], FailurePolicy::ContinueOnFailure),
            ],
            false,
        );
        assert_eq!(report.overall_status(), OverallStatus::Failed);
        assert_eq!(report.termination(), Termination::Failed);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn failed_steps_flattened_in_order() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![
                phase_result("a", vec![failed("a1"), ok("a2"), failed("a3")], FailurePolicy::ContinueOnFailure),
                phase_result("b", vec![failed("b1")], FailurePolicy::ContinueOnFailure),
            ],
            false,
        );
        let ids: Vec<(&str, &str)> = report
            .failed_steps()
            .iter()
            .map(|f| (f.phase_id.as_str(), f.result.step_id()))
            .collect();
        assert_eq!(ids, vec![("a", "a1"), ("a", "a3"), ("b", "b1")]);
    }

    #[test]
    fn aborted_run_lists_not_run_phases() {
        let mut recorder = RunRecorder::start("run_1", false);
        recorder.phase_finished(phase_result(
            "a",
            vec![failed("x")],
            FailurePolicy::HaltOnFirstFailure,
        ));
        recorder.phase_not_run(
            &Phase::new("b"),
            NotRunReason::Halted {
                after: "a".to_string(),
            },
        );
        let report = recorder.finish(true);

        assert_eq!(report.overall_status(), OverallStatus::Failed);
        assert_eq!(report.termination(), Termination::Aborted);
        assert_eq!(report.exit_code(), 2);
        assert!(report.phase("b").is_none());
        assert_eq!(report.not_run()[0].phase_id, "b");
        assert_eq!(report.stats().phases_not_run, 1);
    }

    #[test]
    fn skipped_phases_do_not_fail_run() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![PhaseResult::skipped(&Phase::new("a"))],
            false,
        );
        assert_eq!(report.overall_status(), OverallStatus::Succeeded);
        assert_eq!(report.stats().phases_skipped, 1);
    }

    #[test]
    fn stats_exclude_skipped_steps_from_success_rate() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result(
                "a",
                vec![ok("x"), failed("y"), StepResult::skipped("z")],
                FailurePolicy::ContinueOnFailure,
            )],
            false,
        );
        let stats = report.stats();
        assert_eq!(stats.steps_total, 3);
        assert_eq!(stats.steps_skipped, 1);
        assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_file_name_uses_start_time() {
        let report = ExecutionReport::finalize("run_1", vec![], false);
        let name = report.default_file_name();
        assert!(name.starts_with("phaseline_report_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "phaseline_report_20240101_000000.json".len());
    }

    #[test]
    fn write_json_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result("a", vec![ok("x")], FailurePolicy::HaltOnFirstFailure)],
            false,
        );

        let path = report.write_json(dir.path()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert_eq!(json["run_id"], "run_1");
        assert_eq!(json["overall_status"], "succeeded");
        assert_eq!(json["phase_results"][0]["phase_id"], "a");
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result("a", vec![failed("x")], FailurePolicy::HaltOnFirstFailure)],
            false,
        );
        let json = report.to_json().unwrap();
        let parsed: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.failed_steps().len(), 1);
        assert_eq!(parsed.failed_steps()[0].phase_id, "a");
    }

    #[test]
    fn failed_step_entry_reports_idempotence() {
        let report = ExecutionReport::finalize(
            "run_1",
            vec![phase_result(
                "a",
                vec![failed("x").with_idempotent(true), failed("y")],
                FailurePolicy::ContinueOnFailure,
            )],
            false,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["failed_steps"][0]["step_id"], "x");
        assert_eq!(json["failed_steps"][0]["idempotent"], true);
        assert_eq!(json["failed_steps"][1]["idempotent"], false);
    }
}
