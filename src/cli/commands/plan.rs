//! Plan command implementation.
//!
//! The `phaseline plan` command prints phases in execution order without
//! running anything.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::PlanArgs;
use crate::error::Result;
use crate::runner::Pipeline;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::load_pipeline;

/// One phase in the execution plan.
#[derive(Debug, Serialize)]
pub struct PlannedPhase {
    pub position: usize,
    pub id: String,
    pub name: String,
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
    pub steps: Vec<String>,
}

/// Phases of `pipeline` in execution order.
pub fn plan(pipeline: &Pipeline) -> Vec<PlannedPhase> {
    pipeline
        .phases()
        .iter()
        .enumerate()
        .map(|(i, phase)| PlannedPhase {
            position: i + 1,
            id: phase.id.clone(),
            name: phase.name.clone(),
            depends_on: phase.depends_on.clone(),
            max_parallel: phase.max_parallel,
            steps: phase.steps.iter().map(|s| s.id.clone()).collect(),
        })
        .collect()
}

/// The plan command implementation.
pub struct PlanCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: PlanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            args,
        }
    }
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = match load_pipeline(&self.project_root, self.config_override.as_deref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::setup_error());
            }
        };
        let planned = plan(&loaded.pipeline);

        if self.args.json {
            let json = serde_json::to_string_pretty(&planned).map_err(anyhow::Error::from)?;
            println!("{}", json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("{} execution plan", loaded.display_name()));
        for phase in &planned {
            let mut line = format!("{:>3}. {}", phase.position, phase.id);
            if phase.name != phase.id {
                line.push_str(&format!(" ({})", phase.name));
            }
            ui.message(&line);
            if !phase.depends_on.is_empty() {
                ui.message(&format!("     after: {}", phase.depends_on.join(", ")));
            }
            let mut steps = format!("     steps: {}", phase.steps.join(", "));
            if let Some(max) = phase.max_parallel {
                steps.push_str(&format!(" (max {} at a time)", max));
            }
            ui.message(&steps);
        }

        let step_count = loaded.pipeline.step_count();
        ui.message(&format!(
            "\n{} phases, {} steps",
            planned.len(),
            step_count
        ));

        Ok(CommandResult::success())
    }
}
