//! Shell command execution.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::runner::CancellationToken;

/// How often a running child is checked for exit and cancellation.
const WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,

    /// Whether the child was killed because the cancellation token fired.
    pub killed: bool,
}

impl CommandResult {
    /// Number of non-empty stdout lines.
    pub fn stdout_lines(&self) -> usize {
        self.stdout.lines().filter(|l| !l.trim().is_empty()).count()
    }

    /// Last non-empty stderr line, for error messages.
    pub fn last_stderr_line(&self) -> Option<&str> {
        self.stderr.lines().rev().find(|l| !l.trim().is_empty())
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,
}

/// Execute a shell command, killing it if `cancel` fires.
///
/// Output is captured in full; each line is also logged at debug level.
/// Returns an error only when the shell cannot be started.
pub fn execute(
    command: &str,
    options: &CommandOptions,
    cancel: &CancellationToken,
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(shell_program());
    cmd.arg(shell_flag());
    cmd.arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        debug!("Failed to spawn '{}': {}", command, e);
        PipelineError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    let stdout_handle = child.stdout.take().map(|s| read_lines(s, "stdout"));
    let stderr_handle = child.stderr.take().map(|s| read_lines(s, "stderr"));

    let (status, killed) = wait_or_kill(&mut child, cancel).map_err(|e| {
        debug!("Failed to wait for '{}': {}", command, e);
        PipelineError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    // Grandchildren of a killed shell can hold the pipes open; leave the
    // readers detached rather than wait on them.
    let (stdout, stderr) = if killed {
        (String::new(), String::new())
    } else {
        (join_output(stdout_handle), join_output(stderr_handle))
    };

    Ok(CommandResult {
        exit_code: status.code(),
        stdout,
        stderr,
        duration: start.elapsed(),
        success: status.success() && !killed,
        killed,
    })
}

fn wait_or_kill(
    child: &mut Child,
    cancel: &CancellationToken,
) -> std::io::Result<(std::process::ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if cancel.wait_timeout(WAIT_INTERVAL) {
            // The child may have exited between the checks; kill errors are fine.
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status, true));
        }
    }
}

/// Drain `stream` to EOF on its own thread.
///
/// Lines are read as raw bytes and decoded lossily: tools that print
/// non-UTF-8 paths must not have their pipe closed under them.
fn read_lines<R: Read + Send + 'static>(stream: R, label: &'static str) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut output = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            debug!(stream = label, "{}", line);
            output.push_str(line);
            output.push('\n');
        }
        output
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// The shell used to run step commands.
fn shell_program() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        "/bin/sh".to_string()
    }
}

/// Get the flag to pass commands to the shell.
///
/// A plain non-interactive shell: batch steps must not depend on a user's
/// interactive profile.
fn shell_flag() -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else {
        "-c"
    }
}
