//! Output formatting
//!
//! Every command prints through a [`Formatter`] so that `--json`,
//! `--no-color` and `--quiet` behave the same everywhere.

mod formatter;
mod progress;

pub use formatter::{Formatter, format_size, format_timestamp};
pub use progress::PartProgress;

/// Output flags shared by all commands
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Strict JSON on stdout, no colors, no progress
    pub json: bool,
    /// Disable ANSI colors
    pub no_color: bool,
    /// Only print errors
    pub quiet: bool,
}
