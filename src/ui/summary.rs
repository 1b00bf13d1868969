//! Run summary rendering.
//!
//! The same lines are printed by [`TerminalUI`](super::TerminalUI) and
//! written to the log by [`log_summary`].

use crate::runner::{ExecutionReport, OverallStatus, PhaseStatus};
use crate::steps::format_duration;

use super::PhaselineTheme;

/// Render the end-of-run summary.
pub fn render_summary(report: &ExecutionReport, theme: &PhaselineTheme) -> Vec<String> {
    let stats = report.stats();
    let mut lines = Vec::new();

    for phase in report.phase_results() {
        let label = format!(
            "{} ({}, {})",
            phase.name(),
            phase.status(),
            format_duration(phase.duration())
        );
        lines.push(match phase.status() {
            PhaseStatus::Succeeded => theme.format_success(&label),
            PhaseStatus::PartiallyFailed => theme.format_warning(&label),
            PhaseStatus::Failed => theme.format_error(&label),
            PhaseStatus::Skipped => theme.format_skipped(&format!("{} (skipped)", phase.name())),
        });
    }

    for phase in report.not_run() {
        lines.push(theme.format_not_run(&format!("{} ({})", phase.name, phase.reason)));
    }

    if !report.failed_steps().is_empty() {
        lines.push(String::new());
        lines.push(format!("{}", theme.key.apply_to("Failed steps:")));
        for failed in report.failed_steps() {
            lines.push(format!(
                "  {} {}",
                theme.error.apply_to(format!(
                    "{}.{}",
                    failed.phase_id,
                    failed.result.summary_line()
                )),
                theme.dim.apply_to(rerun_hint(failed.result.is_idempotent())),
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{} {}/{} steps succeeded ({:.1}%), {} failed, {} skipped {} {}",
        theme.key.apply_to("Steps:"),
        stats.steps_succeeded,
        stats.steps_total,
        stats.success_rate,
        stats.steps_failed,
        stats.steps_skipped,
        theme.dim.apply_to("·"),
        theme
            .duration
            .apply_to(format_duration(report.total_duration())),
    ));

    let status = format!("Run {} {}", report.run_id(), report.overall_status());
    lines.push(match report.overall_status() {
        OverallStatus::Succeeded => theme.format_success(&status),
        OverallStatus::DryRun => theme.format_skipped(&status),
        OverallStatus::Failed => theme.format_error(&status),
    });

    lines
}

fn rerun_hint(idempotent: bool) -> &'static str {
    if idempotent {
        "(idempotent: safe to re-run)"
    } else {
        "(not idempotent: check its outputs before re-running)"
    }
}

/// Write the summary to the log.
pub fn log_summary(report: &ExecutionReport) {
    let stats = report.stats();
    tracing::info!(
        run_id = report.run_id(),
        status = %report.overall_status(),
        duration = %format_duration(report.total_duration()),
        success_rate = format!("{:.1}", stats.success_rate),
        "Run finished: {}/{} steps succeeded, {} failed, {} skipped",
        stats.steps_succeeded,
        stats.steps_total,
        stats.steps_failed,
        stats.steps_skipped
    );
    for failed in report.failed_steps() {
        tracing::error!(
            phase = %failed.phase_id,
            idempotent = failed.result.is_idempotent(),
            "Failed step: {}",
            failed.result.summary_line()
        );
    }
    for phase in report.not_run() {
        tracing::warn!(phase = %phase.phase_id, "Phase not run: {}", phase.reason);
    }
}
