//! Output verbosity.

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Show every step as it finishes, plus debug logging.
    Verbose,
    /// Show phase progress and the final summary.
    #[default]
    Normal,
    /// Show the final summary and errors only.
    Quiet,
}

impl OutputMode {
    /// Pick the mode from the global `--verbose` / `--quiet` flags.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Check if this mode lists every finished step.
    pub fn shows_step_results(&self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Check if this mode shows the progress bar.
    pub fn shows_progress(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    /// Check if this mode shows status messages.
    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Quiet)
    }
}
