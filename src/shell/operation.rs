//! Steps backed by shell commands.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::steps::{Metrics, Operation, OperationContext, OperationError, OperationOutcome};

use super::command::{execute, CommandOptions};

/// Shell builtins that never resolve on `PATH` but always exist.
const SHELL_BUILTINS: &[&str] = &[
    ":", ".", "[", "break", "cd", "continue", "echo", "eval", "exec", "exit", "export", "false",
    "printf", "pwd", "read", "return", "set", "shift", "test", "trap", "true", "umask", "unset",
];

/// An [`Operation`] that runs a command through the platform shell.
///
/// Exit code 0 is success. A non-zero exit is a transient failure when the
/// code is listed in `transient_exit_codes`, otherwise fatal. The child is
/// killed when the attempt's cancellation token fires.
#[derive(Debug, Clone)]
pub struct CommandOperation {
    command: String,
    workdir: Option<PathBuf>,
    env: HashMap<String, String>,
    transient_exit_codes: Vec<i32>,
}

impl CommandOperation {
    /// Create an operation for a command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            workdir: None,
            env: HashMap::new(),
            transient_exit_codes: Vec::new(),
        }
    }

    /// Run in this working directory.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Add environment variables.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Treat these exit codes as retry-eligible.
    pub fn with_transient_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.transient_exit_codes = codes;
        self
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The first word of the command line.
    pub fn program(&self) -> Option<&str> {
        self.command.split_whitespace().next()
    }

    fn options(&self, ctx: &OperationContext) -> CommandOptions {
        let mut env = self.env.clone();
        env.insert("PHASELINE_RUN_ID".to_string(), ctx.run_id.clone());
        env.insert("PHASELINE_PHASE".to_string(), ctx.phase_id.clone());
        env.insert("PHASELINE_STEP".to_string(), ctx.step_id.clone());
        env.insert("PHASELINE_ATTEMPT".to_string(), ctx.attempt.to_string());
        for (key, value) in &ctx.params {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            env.insert(format!("PHASELINE_PARAM_{}", env_key(key)), value);
        }

        CommandOptions {
            cwd: self.workdir.clone(),
            env,
        }
    }

    fn resolve_program(&self, program: &str) -> Option<PathBuf> {
        if SHELL_BUILTINS.contains(&program) {
            return Some(PathBuf::from(program));
        }

        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            let path = match (&self.workdir, candidate.is_relative()) {
                (Some(dir), true) => dir.join(candidate),
                _ => candidate.to_path_buf(),
            };
            return path.exists().then_some(path);
        }

        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .flat_map(|dir| executable_names(program).into_iter().map(move |n| dir.join(n)))
            .find(|p| p.is_file())
    }
}

impl Operation for CommandOperation {
    fn execute(&self, ctx: &OperationContext) -> OperationOutcome {
        let options = self.options(ctx);
        let result = execute(&self.command, &options, &ctx.cancel)
            .map_err(|e| OperationError::fatal(e.to_string()))?;

        if result.killed {
            return Err(OperationError::cancelled(format!(
                "command killed: {}",
                self.command
            )));
        }

        if result.success {
            let mut metrics = Metrics::new();
            metrics.insert("exit_code".to_string(), 0.into());
            metrics.insert(
                "duration_ms".to_string(),
                (result.duration.as_millis() as u64).into(),
            );
            metrics.insert("stdout_lines".to_string(), result.stdout_lines().into());
            return Ok(metrics);
        }

        let detail = result
            .last_stderr_line()
            .map(|l| format!(": {}", l.trim()))
            .unwrap_or_default();

        match result.exit_code {
            Some(code) => {
                let message = format!("command exited with code {}{}", code, detail);
                let error = if self.transient_exit_codes.contains(&code) {
                    OperationError::transient(message)
                } else {
                    OperationError::fatal(message)
                };
                Err(error.with_code(code.to_string()))
            }
            None => Err(OperationError::fatal(format!(
                "command terminated by signal{}",
                detail
            ))),
        }
    }

    fn probe(&self, ctx: &OperationContext) -> OperationOutcome {
        if let Some(dir) = &self.workdir {
            if !dir.is_dir() {
                return Err(OperationError::fatal(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        let program = self
            .program()
            .ok_or_else(|| OperationError::fatal("command is empty"))?;
        let resolved = self.resolve_program(program).ok_or_else(|| {
            OperationError::fatal(format!("program not found: {}", program))
        })?;

        info!(
            phase = %ctx.phase_id,
            step = %ctx.step_id,
            "Would execute: {}",
            self.command
        );

        let mut metrics = Metrics::new();
        metrics.insert("would_execute".to_string(), self.command.clone().into());
        metrics.insert(
            "program".to_string(),
            resolved.display().to_string().into(),
        );
        Ok(metrics)
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

/// Turn a parameter name into an environment variable suffix.
fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn executable_names(program: &str) -> Vec<String> {
    if cfg!(target_os = "windows") && Path::new(program).extension().is_none() {
        vec![
            program.to_string(),
            format!("{}.exe", program),
            format!("{}.cmd", program),
            format!("{}.bat", program),
        ]
    } else {
        vec![program.to_string()]
    }
}
