//! Check command implementation.
//!
//! The `phaseline check` command validates the configuration and the
//! phase dependency graph without running anything.

use std::path::{Path, PathBuf};

use crate::cli::args::CheckArgs;
use crate::config::{build_pipeline, load_config, validate_config};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    _args: CheckArgs,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: CheckArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            _args: args,
        }
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let (path, config) =
            match load_config(&self.project_root, self.config_override.as_deref()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    ui.error(&e.to_string());
                    return Ok(CommandResult::setup_error());
                }
            };

        let errors = validate_config(&config);
        if !errors.is_empty() {
            for error in &errors {
                let location = match (&error.phase, &error.step) {
                    (Some(phase), Some(step)) => format!(" ({}.{})", phase, step),
                    (Some(phase), None) => format!(" ({})", phase),
                    _ => String::new(),
                };
                ui.error(&format!("{}{}", error, location));
            }
            ui.message(&format!(
                "{} problem(s) found in {}",
                errors.len(),
                path.display()
            ));
            return Ok(CommandResult::setup_error());
        }

        let base_dir = path.parent().unwrap_or(self.project_root.as_path());
        let pipeline = match build_pipeline(&config, base_dir) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::setup_error());
            }
        };

        ui.success(&format!(
            "{} is valid: {} phases, {} steps",
            path.display(),
            pipeline.phases().len(),
            pipeline.step_count()
        ));
        Ok(CommandResult::success())
    }
}
