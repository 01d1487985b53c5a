//! Terminal output of check results and status messages.
//!
//! Check results go to stdout as `[✔] message` / `[✖] message` lines. Status
//! messages of maintenance commands go to stderr, right-aligned like
//! `    Updated debian_codenames.json`. Log output is separate and handled by
//! tracing.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

use crate::core::check::CheckResult;

const GREEN: &str = "\x1b[1;32m";
const RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl ColorChoice {
    /// Resolve against a stream.
    pub fn use_color(&self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for maintenance messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Updated,
    Removed,
    Fresh,
    Stale,
    Missing,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Updated => "Updated",
            Status::Removed => "Removed",
            Status::Fresh => "Fresh",
            Status::Stale => "Stale",
            Status::Missing => "Missing",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Updated | Status::Removed | Status::Fresh => GREEN,
            Status::Stale | Status::Missing => "\x1b[1;33m",
            Status::Error => RED,
        }
    }
}

const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    stdout_color: bool,
    stderr_color: bool,
}

impl Shell {
    pub fn new(color: ColorChoice) -> Self {
        Shell {
            stdout_color: color.use_color(io::stdout().is_terminal()),
            stderr_color: color.use_color(io::stderr().is_terminal()),
        }
    }

    /// Print the results of one check under a header line.
    pub fn check_results(&self, check_name: &str, results: &[CheckResult]) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", check_name);

        for result in results {
            let _ = writeln!(out, "{}", self.format_result(result));
        }

        let _ = out.flush();
    }

    /// `[✔] message` or `[✖] message`.
    pub fn format_result(&self, result: &CheckResult) -> String {
        let (symbol, color) = if result.passed {
            ("✔", GREEN)
        } else {
            ("✖", RED)
        };

        if self.stdout_color {
            format!("{}[{}] {}{}", color, symbol, result.message, RESET)
        } else {
            format!("[{}] {}", symbol, result.message)
        }
    }

    /// Print a status message to stderr.
    ///
    /// Format: `{status:>12} {message}`
    pub fn status(&self, status: Status, msg: impl Display) {
        eprintln!("{} {}", self.format_status(status), msg);
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();

        if self.stderr_color {
            format!(
                "{}{:>width$}{}",
                status.color_code(),
                text,
                RESET,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ColorChoice::default())
    }
}
