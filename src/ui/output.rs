//! ui::output
//!
//! Terminal output for `arcstate`.
//!
//! Command results (JSON values, rendered config) go to stdout unconditionally
//! so they can be piped. Status lines and issue lists go to stdout unless
//! `--quiet` is set. Notes, warnings and errors go to stderr.

use std::fmt::Display;

use crate::core::validate::ValidationIssue;

/// How much the CLI says beyond its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    /// `--debug`: also print notes about what was loaded.
    Debug,
}

impl Verbosity {
    /// `--quiet` takes precedence over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }
}

/// Print a command result.
pub fn value(text: impl Display) {
    println!("{text}");
}

/// Print a one-line status such as `ok`.
pub fn status(text: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{text}");
    }
}

/// Print validation issues, one `path: message` per line.
pub fn issues(issues: &[ValidationIssue], verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet && !issues.is_empty() {
        println!("{}", format_issues(issues));
    }
}

pub fn note(text: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {text}");
    }
}

pub fn warn(text: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {text}");
    }
}

/// Print an error. Shown even in quiet mode.
pub fn error(text: impl Display) {
    eprintln!("error: {text}");
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn issues_render_one_per_line() {
        let issues = vec![
            ValidationIssue {
                path: "player.health".to_string(),
                error: "Value must be <= 100".to_string(),
            },
            ValidationIssue {
                path: "player.name".to_string(),
                error: "String length must be >= 1".to_string(),
            },
        ];
        assert_eq!(
            format_issues(&issues),
            "player.health: Value must be <= 100\nplayer.name: String length must be >= 1"
        );
        assert_eq!(format_issues(&[]), "");
    }
}
