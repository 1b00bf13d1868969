//! Configuration loading, parsing, and validation for phaseline.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//! - Conversion into runnable definitions in [`build`]
//!
//! # Example
//!
//! ```
//! use phaseline::config::{build_pipeline, parse_config};
//! use std::path::Path;
//!
//! let yaml = "
//! phases:
//!   - id: export
//!     steps:
//!       - id: points
//!         command: echo points
//!   - id: sync
//!     depends_on: [export]
//!     steps:
//!       - id: push
//!         command: echo push
//! ";
//! let config = parse_config(yaml, Path::new("phaseline.yml")).unwrap();
//! let pipeline = build_pipeline(&config, Path::new(".")).unwrap();
//! assert_eq!(pipeline.phases()[0].id, "export");
//! ```
//!
//! # Configuration File Locations
//!
//! Without `--config`, phaseline looks in the working directory for
//! `phaseline.yml`, `phaseline.yaml`, then `phaseline.json`.

pub mod build;
pub mod loader;
pub mod schema;
pub mod validator;

// Schema re-exports
pub use schema::{
    PhaseConfig, PipelineConfig, RetryConfig, Settings, StepConfig, MAX_THREAD_COUNT,
    MIN_THREAD_COUNT,
};

// Loader re-exports
pub use loader::{
    find_config, load_config, load_config_file, parse_config, ConfigFormat, DEFAULT_CONFIG_FILES,
};

// Validator re-exports
pub use validator::{validate, validate_config, ValidationError};

// Build re-exports
pub use build::{build_pipeline, run_options};
