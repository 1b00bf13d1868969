//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Phaseline - Dependency-aware batch pipeline runner.
#[derive(Debug, Parser)]
#[command(name = "phaseline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default phaseline.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show every step as it finishes
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the pipeline (default if no command specified)
    Run(RunArgs),

    /// Show the phase execution order
    Plan(PlanArgs),

    /// Validate the configuration and dependency graph
    Check(CheckArgs),
}

/// A `phase.step` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub phase: String,
    pub step: String,
}

impl FromStr for StepRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((phase, step)) if !phase.is_empty() && !step.is_empty() => Ok(Self {
                phase: phase.to_string(),
                step: step.to_string(),
            }),
            _ => Err(format!("expected <phase>.<step>, got '{}'", s)),
        }
    }
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.phase, self.step)
    }
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Probe every step without executing it
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip a phase (repeatable)
    #[arg(short, long = "skip-phase", value_name = "PHASE")]
    pub skip_phase: Vec<String>,

    /// Run only this phase
    #[arg(short, long, value_name = "PHASE")]
    pub phase_only: Option<String>,

    /// Skip a single step (repeatable)
    #[arg(long, value_name = "PHASE.STEP")]
    pub skip_step: Vec<StepRef>,

    /// Keep running independent phases after a failure
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Worker pool size (overrides settings.thread_count)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Write the JSON execution report to this file or directory
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Also write logs to this file (overrides settings.log_path)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Output the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {}

impl Cli {
    /// Log file requested on the command line, if any.
    pub fn log_file(&self) -> Option<&PathBuf> {
        match &self.command {
            Some(Commands::Run(args)) => args.log_file.as_ref(),
            _ => None,
        }
    }
}
