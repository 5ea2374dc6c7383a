//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// arcstate - inspect and validate arcade state snapshots
#[derive(Parser, Debug)]
#[command(name = "arcstate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a state snapshot against a schema
    #[command(
        name = "check",
        long_about = "Validate a state snapshot against a schema.\n\n\
            Every path that has a rule in the schema and exists in the snapshot is \
            checked, including numeric bounds that refer to other values in the \
            snapshot. One line is printed per problem and the command exits non-zero \
            if any were found.",
        after_help = "\
EXAMPLES:
    # Validate a saved game
    arcstate check --schema schema.json --state save.json

    # Only the exit status matters
    arcstate -q check --schema schema.json --state save.json"
    )]
    Check {
        /// Schema document (JSON)
        #[arg(long, value_name = "FILE")]
        schema: PathBuf,

        /// State snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },

    /// Print the value at a dot-path
    #[command(
        name = "get",
        after_help = "\
EXAMPLES:
    arcstate get --state save.json player.health
    arcstate get --state save.json enemies.0"
    )]
    Get {
        /// State snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        state: PathBuf,

        /// Dot-separated path; empty for the whole tree
        #[arg(default_value = "")]
        path: String,
    },

    /// Print the effective store configuration
    #[command(
        name = "config",
        long_about = "Print the effective store configuration as TOML.\n\n\
            The configuration comes from --config, else $ARCSTATE_CONFIG, else the \
            built-in defaults."
    )]
    Config {
        /// Configuration file (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}
