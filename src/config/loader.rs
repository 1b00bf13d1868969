//! Configuration file discovery and loading.

use crate::config::schema::PipelineConfig;
use crate::error::{PipelineError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File names tried, in order, when no config path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["phaseline.yml", "phaseline.yaml", "phaseline.json"];

/// Config file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format for a path. Anything not ending in `.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Find the config file to use.
///
/// An explicit override is returned as-is (resolved against `project_root`
/// when relative). Otherwise the first existing default file wins.
///
/// # Errors
///
/// Returns `ConfigNotFound` if no candidate exists.
pub fn find_config(project_root: &Path, config_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_override {
        let path = if path.is_relative() {
            project_root.join(path)
        } else {
            path.to_path_buf()
        };
        return if path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::ConfigNotFound { path })
        };
    }

    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| project_root.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| PipelineError::ConfigNotFound {
            path: project_root.join(DEFAULT_CONFIG_FILES[0]),
        })
}

/// Load a single config file and parse it into PipelineConfig.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML or JSON is invalid.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PipelineError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse config content, choosing the format from `source_path`.
///
/// # Arguments
///
/// * `content` - The YAML or JSON content to parse
/// * `source_path` - Path for format detection and error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<PipelineConfig> {
    let parsed = match ConfigFormat::from_path(source_path) {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml if content.trim().is_empty() => Ok(PipelineConfig::default()),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| PipelineError::ConfigParseError {
        path: source_path.to_path_buf(),
        message,
    })
}

/// Discover and load the config for a project.
pub fn load_config(
    project_root: &Path,
    config_override: Option<&Path>,
) -> Result<(PathBuf, PipelineConfig)> {
    let path = find_config(project_root, config_override)?;
    let config = load_config_file(&path)?;
    Ok((path, config))
}
