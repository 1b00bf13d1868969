//! Run progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::ProgressHandle;

const TEMPLATE: &str = "{spinner:.cyan} [{bar:24.cyan/dim}] {pos}/{len} steps {msg:.dim}";

/// A progress bar over every step in the run.
pub struct StepProgress {
    bar: ProgressBar,
}

impl StepProgress {
    /// Create a visible progress bar for `total` steps.
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Create a progress bar that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressHandle for StepProgress {
    fn set_position(&mut self, completed: usize) {
        self.bar.set_position(completed as u64);
    }

    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn println(&mut self, line: &str) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(line);
    }

    fn is_visible(&self) -> bool {
        !self.bar.is_hidden()
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for StepProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
