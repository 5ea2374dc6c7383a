//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads its inputs from disk
//! 2. Builds a store over them
//! 3. Formats and displays output
//!
//! Handlers return `anyhow::Result`; a failed check is reported as an error
//! so the process exits non-zero.

mod check;
mod config_cmd;
mod get;

pub use check::check;
pub use config_cmd::config;
pub use get::get;

use super::args::Command;
use super::Context;
use anyhow::{Context as _, Result};
use serde_json::Value;
use std::path::Path;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Check { schema, state } => check(ctx, &schema, &state),
        Command::Get { state, path } => get(ctx, &state, &path),
        Command::Config { config: path } => config(ctx, path.as_deref()),
    }
}

/// Read and parse a JSON file.
pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}
