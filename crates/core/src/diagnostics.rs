//! Per-invocation diagnostics text and elapsed-time tracking.
//!
//! A [`Diagnostics`] buffer belongs to exactly one command. Error reports
//! replace its contents, info reports append to it (when the session asked
//! for info output), and the caller reads the final text once the command has
//! finished.

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

/// Line terminator appended after every report.
pub const NL: char = '\n';

/// Append-only text accumulator with reset-on-error semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    text: String,
    verbose: bool,
}

impl Diagnostics {
    /// Create an empty buffer with info reports disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable info reports.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Returns `true` if info reports are recorded.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Replace the contents with `message` and a line terminator.
    ///
    /// Always returns `false` so an operation can end with
    /// `return Ok(diagnostics.error(..))`.
    pub fn error(&mut self, message: impl Display) -> bool {
        self.text.clear();
        self.line(message);
        false
    }

    /// Append `message` and a line terminator if info reports are enabled.
    ///
    /// Always returns `true`.
    pub fn info(&mut self, message: impl Display) -> bool {
        if self.verbose {
            self.line(message);
        }
        true
    }

    /// Accumulated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Drop all recorded text.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Replace this buffer's text with another buffer's text.
    ///
    /// The verbosity flag of `self` is left unchanged.
    pub fn adopt(&mut self, other: Diagnostics) {
        self.text = other.text;
    }

    fn line(&mut self, message: impl Display) {
        self.text.push_str(&message.to_string());
        self.text.push(NL);
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Elapsed-time tracker started on construction.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since the timer was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

impl Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.elapsed().as_secs_f64() * 1000.0;
        write!(f, "{:.2} ms", ms)
    }
}

/// Length of the longest string, for column-aligned info output.
pub fn max_length<S: AsRef<str>>(strings: &[S]) -> usize {
    strings
        .iter()
        .map(|s| s.as_ref().chars().count())
        .max()
        .unwrap_or(0)
}
