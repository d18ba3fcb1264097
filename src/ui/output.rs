//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Every
//! line attributable to one repository carries a colored `[name]`
//! prefix, each repository keeping one color for the whole run so
//! interleaved parallel output stays readable.

use std::fmt::Display;

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// The color a repository's log prefix is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogColor {
    #[default]
    Cyan,
    Blue,
    Green,
    Yellow,
    Magenta,
    Red,
    White,
}

impl LogColor {
    /// All colors accepted in configuration.
    pub const ALL: [LogColor; 7] = [
        LogColor::Cyan,
        LogColor::Blue,
        LogColor::Green,
        LogColor::Yellow,
        LogColor::Magenta,
        LogColor::Red,
        LogColor::White,
    ];

    /// Parse a configuration value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cyan" => Some(LogColor::Cyan),
            "blue" => Some(LogColor::Blue),
            "green" => Some(LogColor::Green),
            "yellow" => Some(LogColor::Yellow),
            "magenta" => Some(LogColor::Magenta),
            "red" => Some(LogColor::Red),
            "white" => Some(LogColor::White),
            _ => None,
        }
    }

    fn paint(&self, text: &str) -> colored::ColoredString {
        match self {
            LogColor::Cyan => text.cyan(),
            LogColor::Blue => text.blue(),
            LogColor::Green => text.green(),
            LogColor::Yellow => text.yellow(),
            LogColor::Magenta => text.magenta(),
            LogColor::Red => text.red(),
            LogColor::White => text.white(),
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("{}", format!("error: {}", message).red());
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("{}", format!("warning: {}", message).yellow());
    }
}

/// Print a section header banner.
pub fn header(title: &str, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!(
            "{}",
            format!("[ ----------------------- {title} ----------------------- ]").magenta()
        );
    }
}

/// Print a repository-attributed line: colored `[name]` prefix.
pub fn repo_line(color: LogColor, name: &str, message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{} {}", color.paint(&format!("[{name}]")), message);
    }
}
