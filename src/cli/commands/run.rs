//! Run command implementation.
//!
//! The `phaseline run` command executes the pipeline and writes the
//! execution report.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cli::args::RunArgs;
use crate::config::run_options;
use crate::error::Result;
use crate::runner::{
    CancellationToken, ExecutionReport, FailurePolicy, PipelineRunner, RunOptions, RunProgress,
};
use crate::steps::StepStatus;
use crate::ui::{log_summary, ProgressHandle, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::{load_pipeline, LoadedPipeline};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Config settings with command-line overrides applied on top.
    fn build_options(&self, loaded: &LoadedPipeline) -> RunOptions {
        let mut options = run_options(&loaded.config);

        if self.args.dry_run {
            options = options.dry_run(true);
        }
        if self.args.continue_on_failure {
            options = options.with_failure_policy(FailurePolicy::ContinueOnFailure);
        }
        if let Some(threads) = self.args.threads {
            options = options.with_threads(threads);
        }
        for phase in &self.args.skip_phase {
            options = options.skip_phase(phase.clone());
        }
        if let Some(phase) = &self.args.phase_only {
            options = options.only_phase(phase.clone());
        }
        for step in &self.args.skip_step {
            options = options.skip_step(step.phase.clone(), step.step.clone());
        }

        options
    }

    /// Where the report goes: `--report`, else `settings.report_dir`.
    fn report_target(&self, loaded: &LoadedPipeline) -> Option<PathBuf> {
        match &self.args.report {
            Some(path) => Some(path.clone()),
            None => loaded
                .config
                .settings
                .report_dir
                .as_deref()
                .map(|dir| loaded.resolve(dir)),
        }
    }

    fn write_report(&self, report: &ExecutionReport, target: &Path, ui: &mut dyn UserInterface) {
        match report.write_json(target) {
            Ok(path) => ui.message(&format!("Report written to {}", path.display())),
            Err(e) => {
                warn!("Failed to write report: {}", e);
                ui.warning(&format!("Could not write report to {}: {}", target.display(), e));
            }
        }
    }
}

/// Cancel `token` when the operator presses Ctrl-C.
fn install_interrupt_handler(token: CancellationToken) {
    let result = ctrlc::set_handler(move || {
        if !token.is_cancelled() {
            eprintln!("\nInterrupted, waiting for running steps to finish...");
            token.cancel();
        }
    });
    if let Err(e) = result {
        debug!("Interrupt handler not installed: {}", e);
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = match load_pipeline(&self.project_root, self.config_override.as_deref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::setup_error());
            }
        };

        let options = self.build_options(&loaded);
        let dry_run = options.dry_run;
        let mut runner = match PipelineRunner::new(&loaded.pipeline, options) {
            Ok(runner) => runner,
            Err(e) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::setup_error());
            }
        };
        install_interrupt_handler(runner.cancellation_token());

        let title = if dry_run {
            format!("{} (dry run)", loaded.display_name())
        } else {
            loaded.display_name()
        };
        ui.show_header(&title);

        let show_steps = ui.output_mode().shows_step_results();
        let mut progress: Option<Box<dyn ProgressHandle>> = None;

        let report = runner.run_with_progress(|event| match event {
            RunProgress::RunStarting { steps, .. } => {
                progress = Some(ui.start_progress(steps));
            }
            RunProgress::PhaseStarting { phase, index, total } => {
                if let Some(progress) = progress.as_mut() {
                    progress.set_message(&phase.name);
                }
                ui.show_phase(&phase.name, index + 1, total);
            }
            RunProgress::PhaseSkipped { phase } => {
                ui.message(&format!("  Skipping {}", phase.name));
            }
            RunProgress::PhaseNotRun { phase, reason } => {
                ui.warning(&format!("{} not run: {}", phase.name, reason));
            }
            RunProgress::StepFinished {
                phase_id,
                result,
                completed,
                ..
            } => {
                if let Some(progress) = progress.as_mut() {
                    progress.set_position(completed);
                }
                let line = match result.status() {
                    StepStatus::Failed => {
                        Some((format!("{}.{}", phase_id, result.summary_line()), true))
                    }
                    _ if show_steps => Some((format!("  {}", result.summary_line()), false)),
                    _ => None,
                };
                // Lines written past a drawn bar would tear it.
                if let Some((line, failed)) = line {
                    match progress.as_mut().filter(|p| p.is_visible()) {
                        Some(progress) => progress.println(&line),
                        None if failed => ui.error(&line),
                        None => ui.message(&line),
                    }
                }
            }
            RunProgress::PhaseFinished { .. } => {}
        })?;

        if let Some(mut progress) = progress {
            progress.finish();
        }

        ui.show_run_summary(&report);
        log_summary(&report);

        if let Some(target) = self.report_target(&loaded) {
            self.write_report(&report, &target, ui);
        }

        Ok(CommandResult::from_exit_code(report.exit_code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::StepRef;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn project(yaml: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("phaseline.yml"), yaml).unwrap();
        temp
    }

    const PIPELINE: &str = r#"
name: Nightly
settings:
  thread_count: 2
  retry:
    max_attempts: 1
phases:
  - id: export
    steps:
      - id: points
        command: "true"
      - id: lines
        command: "true"
  - id: sync
    depends_on: [export]
    steps:
      - id: push
        command: "true"
"#;

    #[test]
    fn build_options_applies_overrides() {
        let temp = project(PIPELINE);
        let loaded = load_pipeline(temp.path(), None).unwrap();
        let cmd = RunCommand::new(
            temp.path(),
            None,
            RunArgs {
                dry_run: true,
                skip_phase: vec!["sync".to_string()],
                skip_step: vec![StepRef {
                    phase: "export".to_string(),
                    step: "lines".to_string(),
                }],
                continue_on_failure: true,
                threads: Some(3),
                ..Default::default()
            },
        );

        let options = cmd.build_options(&loaded);
        assert!(options.dry_run);
        assert_eq!(options.thread_count, 3);
        assert_eq!(options.failure_policy, FailurePolicy::ContinueOnFailure);
        assert!(options.skip_phases.contains("sync"));
        assert!(options.skip_steps["export"].contains("lines"));
        assert_eq!(options.retry.max_attempts, 1);
    }

    #[test]
    fn report_target_prefers_flag() {
        let temp = project(&PIPELINE.replace(
            "thread_count: 2",
            "thread_count: 2\n  report_dir: reports",
        ));
        let loaded = load_pipeline(temp.path(), None).unwrap();

        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());
        assert_eq!(
            cmd.report_target(&loaded),
            Some(temp.path().join("reports"))
        );

        let cmd = RunCommand::new(
            temp.path(),
            None,
            RunArgs {
                report: Some(PathBuf::from("/tmp/out.json")),
                ..Default::default()
            },
        );
        assert_eq!(
            cmd.report_target(&loaded),
            Some(PathBuf::from("/tmp/out.json"))
        );
    }

    #[test]
    fn missing_config_is_setup_error() {
        let temp = TempDir::new().unwrap();
        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!ui.errors().is_empty());
    }

    #[test]
    fn unknown_phase_only_is_setup_error() {
        let temp = project(PIPELINE);
        let cmd = RunCommand::new(
            temp.path(),
            None,
            RunArgs {
                phase_only: Some("ghost".to_string()),
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(ui.has_message("ghost"));
    }

    #[cfg(unix)]
    #[test]
    fn runs_pipeline_and_writes_report() {
        let temp = project(PIPELINE);
        let report_path = temp.path().join("report.json");
        let cmd = RunCommand::new(
            temp.path(),
            None,
            RunArgs {
                report: Some(report_path.clone()),
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(ui.headers(), ["Nightly"]);
        assert_eq!(ui.phases().len(), 2);
        assert_eq!(ui.progress_positions().last(), Some(&3));
        assert_eq!(ui.summaries().len(), 1);

        let json = fs::read_to_string(&report_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["overall_status"], "succeeded");
    }

    #[cfg(unix)]
    #[test]
    fn failing_step_halts_run() {
        let temp = project(&PIPELINE.replace(
            "      - id: lines\n        command: \"true\"",
            "      - id: lines\n        command: \"exit 4\"",
        ));
        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
        assert!(ui
            .progress_lines()
            .iter()
            .any(|l| l.starts_with("export.✗ lines")));
        assert!(!ui.has_message("export.✗ lines"));
        assert!(ui.has_message("sync not run"));
    }
}
