//! User interface abstractions.
//!
//! The [`UserInterface`] trait separates what the CLI reports from how it
//! is drawn: [`TerminalUI`] writes styled lines to stdout, while [`MockUI`]
//! captures everything for assertions in tests.

pub mod mock;
pub mod output;
pub mod progress;
pub mod summary;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use progress::StepProgress;
pub use summary::{log_summary, render_summary};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{disable_colors, should_use_colors, PhaselineTheme};

use crate::runner::ExecutionReport;

/// Handle to an in-flight progress display.
pub trait ProgressHandle {
    /// Set the number of finished steps.
    fn set_position(&mut self, completed: usize);

    /// Set the trailing message.
    fn set_message(&mut self, msg: &str);

    /// Print a line above the progress display.
    fn println(&mut self, line: &str);

    /// Whether the display is drawn. Lines for a hidden display go to the UI.
    fn is_visible(&self) -> bool;

    /// Remove the progress display.
    fn finish(&mut self);
}

/// Abstraction over user interaction.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Show a plain message.
    fn message(&mut self, msg: &str);

    /// Show a success message.
    fn success(&mut self, msg: &str);

    /// Show a warning message.
    fn warning(&mut self, msg: &str);

    /// Show an error message. Errors are shown in every mode.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show the title of a phase that is starting.
    fn show_phase(&mut self, name: &str, index: usize, total: usize);

    /// Start a progress display over `total` steps.
    fn start_progress(&mut self, total: usize) -> Box<dyn ProgressHandle>;

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, report: &ExecutionReport);
}
