//! Phaseline CLI entry point.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use phaseline::cli::{Cli, CommandDispatcher, SETUP_ERROR_EXIT_CODE};
use phaseline::config::{find_config, load_config_file};
use phaseline::ui::{create_ui, disable_colors, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` or `--verbose` sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr, and also to `log_file` (without ANSI colors) when given.
fn init_tracing(debug: bool, log_file: Option<File>) {
    let filter = if debug {
        EnvFilter::new("phaseline=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phaseline=info"))
    };

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}

/// Log file from `--log-file`, else from `settings.log_path` in the config.
fn log_path(cli: &Cli, project_root: &Path) -> Option<PathBuf> {
    if let Some(path) = cli.log_file() {
        return Some(path.clone());
    }

    let config_path = find_config(project_root, cli.config.as_deref()).ok()?;
    let config = load_config_file(&config_path).ok()?;
    let path = config.settings.log_path?;
    if path.is_relative() {
        config_path.parent().map(|dir| dir.join(&path))
    } else {
        Some(path)
    }
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle --no-color
    if cli.no_color {
        disable_colors();
    }

    let project_root = std::env::current_dir().unwrap_or_default();

    let log_file = log_path(&cli, &project_root).and_then(|path| match open_log_file(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            None
        }
    });
    init_tracing(cli.debug || cli.verbose, log_file);

    tracing::debug!("Phaseline starting with args: {:?}", cli);

    let output_mode = OutputMode::from_flags(cli.verbose, cli.quiet);
    let mut ui = create_ui(output_mode);

    let dispatcher = CommandDispatcher::new(project_root);

    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(SETUP_ERROR_EXIT_CODE as u8)
        }
    }
}
