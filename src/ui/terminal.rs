//! Terminal UI.

use console::Term;
use std::io::Write;

use crate::runner::ExecutionReport;

use super::{
    render_summary, OutputMode, PhaselineTheme, ProgressHandle, StepProgress, UserInterface,
};

/// Terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: PhaselineTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode) -> Self {
        Self {
            term: Term::stdout(),
            theme: PhaselineTheme::detect(),
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_phase(&mut self, name: &str, index: usize, total: usize) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_phase(name, index, total)).ok();
        }
    }

    fn start_progress(&mut self, total: usize) -> Box<dyn ProgressHandle> {
        if self.mode.shows_progress() && self.term.is_term() {
            Box::new(StepProgress::new(total))
        } else {
            Box::new(StepProgress::hidden())
        }
    }

    fn show_run_summary(&mut self, report: &ExecutionReport) {
        writeln!(self.term).ok();
        for line in render_summary(report, &self.theme) {
            writeln!(self.term, "{}", line).ok();
        }
    }
}

/// Create the UI for this process.
pub fn create_ui(mode: OutputMode) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_output_mode() {
        let ui = TerminalUI::new(OutputMode::Quiet);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn create_ui_respects_mode() {
        let ui = create_ui(OutputMode::Verbose);
        assert_eq!(ui.output_mode(), OutputMode::Verbose);
    }

    #[test]
    fn progress_hidden_when_quiet() {
        let mut ui = TerminalUI::new(OutputMode::Quiet);
        let mut progress = ui.start_progress(3);
        progress.set_position(1);
        progress.finish();
    }
}
