//! Command-line interface for phaseline.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, PlanArgs, RunArgs, StepRef};
pub use commands::{Command, CommandDispatcher, CommandResult, SETUP_ERROR_EXIT_CODE};
