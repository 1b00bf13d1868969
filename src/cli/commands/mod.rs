//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`phaseline run`, `phaseline plan`)
//! - Shared config loading
//! - Consistent global flag handling

pub mod check;
pub mod dispatcher;
pub mod plan;
pub mod run;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, SETUP_ERROR_EXIT_CODE};

use std::path::{Path, PathBuf};

use crate::config::{build_pipeline, load_config, PipelineConfig};
use crate::error::Result;
use crate::runner::Pipeline;

/// A config file loaded and turned into a pipeline.
pub(crate) struct LoadedPipeline {
    pub path: PathBuf,
    pub config: PipelineConfig,
    pub pipeline: Pipeline,
}

impl LoadedPipeline {
    /// Directory holding the config file.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Resolve a settings path against the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_dir().join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Display name for the pipeline.
    pub fn display_name(&self) -> String {
        match self.pipeline.name() {
            Some(name) => name.to_string(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "pipeline".to_string()),
        }
    }
}

/// Find, parse, validate and build the pipeline.
pub(crate) fn load_pipeline(
    project_root: &Path,
    config_override: Option<&Path>,
) -> Result<LoadedPipeline> {
    let (path, config) = load_config(project_root, config_override)?;
    let base_dir = path.parent().unwrap_or(project_root);
    let pipeline = build_pipeline(&config, base_dir)?;
    Ok(LoadedPipeline {
        path,
        config,
        pipeline,
    })
}
