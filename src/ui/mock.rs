//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.
//!
//! # Example
//!
//! ```
//! use phaseline::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Starting run");
//! ui.success("Done!");
//!
//! assert!(ui.messages().contains(&"Starting run".to_string()));
//! assert!(ui.successes().contains(&"Done!".to_string()));
//! ```

use std::sync::{Arc, Mutex};

use crate::runner::ExecutionReport;

use super::{render_summary, OutputMode, PhaselineTheme, ProgressHandle, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    phases: Vec<(String, usize, usize)>,
    summaries: Vec<Vec<String>>,
    progress: Arc<Mutex<Vec<usize>>>,
    progress_lines: Arc<Mutex<Vec<String>>>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Get captured messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get captured success messages.
    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    /// Get captured warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get captured errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Get captured headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get captured phase titles as `(name, index, total)`.
    pub fn phases(&self) -> &[(String, usize, usize)] {
        &self.phases
    }

    /// Get rendered summaries, one per `show_run_summary` call.
    pub fn summaries(&self) -> &[Vec<String>] {
        &self.summaries
    }

    /// Get every position reported to progress handles.
    pub fn progress_positions(&self) -> Vec<usize> {
        self.progress
            .lock()
            .map(|positions| positions.clone())
            .unwrap_or_default()
    }

    /// Get lines printed above progress handles.
    pub fn progress_lines(&self) -> Vec<String> {
        self.progress_lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Check if a message was captured (searches every kind).
    pub fn has_message(&self, text: &str) -> bool {
        self.messages
            .iter()
            .chain(&self.successes)
            .chain(&self.warnings)
            .chain(&self.errors)
            .chain(&self.headers)
            .any(|m| m.contains(text))
    }
}

struct MockProgress {
    positions: Arc<Mutex<Vec<usize>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl ProgressHandle for MockProgress {
    fn set_position(&mut self, completed: usize) {
        if let Ok(mut positions) = self.positions.lock() {
            positions.push(completed);
        }
    }

    fn set_message(&mut self, _msg: &str) {}

    fn println(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn finish(&mut self) {}
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_phase(&mut self, name: &str, index: usize, total: usize) {
        self.phases.push((name.to_string(), index, total));
    }

    fn start_progress(&mut self, _total: usize) -> Box<dyn ProgressHandle> {
        Box::new(MockProgress {
            positions: Arc::clone(&self.progress),
            lines: Arc::clone(&self.progress_lines),
        })
    }

    fn show_run_summary(&mut self, report: &ExecutionReport) {
        self.summaries
            .push(render_summary(report, &PhaselineTheme::plain()));
    }
}
