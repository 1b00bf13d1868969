//! Error types for phaseline operations.
//!
//! This module defines [`PipelineError`], the error type for everything that
//! stops a run before (or instead of) producing an execution report, and a
//! [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `PipelineError` for setup failures: config loading, validation and
//!   graph construction. These abort the run before any phase executes.
//! - Step failures are never `PipelineError`s. They are captured as an
//!   [`OperationError`](crate::steps::OperationError) inside a
//!   [`StepResult`](crate::steps::StepResult) and surface through the report.
//! - Use `anyhow::Error` (via `PipelineError::Other`) for unexpected errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for phaseline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Two phases share the same id.
    #[error("Duplicate phase id: {phase}")]
    DuplicatePhase { phase: String },

    /// Two steps in one phase share the same id.
    #[error("Duplicate step id '{step}' in phase '{phase}'")]
    DuplicateStep { phase: String, step: String },

    /// A phase depends on a phase that was never declared.
    #[error("Phase '{phase}' depends on unknown phase '{dependency}'")]
    UnknownDependency { phase: String, dependency: String },

    /// Phase dependency cycle detected.
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A run option names a phase that does not exist.
    #[error("Unknown phase: {phase}")]
    UnknownPhase { phase: String },

    /// Shell command could not be started.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for phaseline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
