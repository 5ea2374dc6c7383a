//! config command - Print the effective store configuration

use crate::cli::Context;
use crate::core::config::Config;
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};
use std::path::Path;

/// Print the configuration resolved from `path`, the environment, or defaults.
pub fn config(ctx: &Context, path: Option<&Path>) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let result = Config::load(path).context("Failed to load config")?;
    for warning in &result.warnings {
        output::warn(warning, verbosity);
    }

    let loaded = result.config;
    match loaded.source() {
        Some(source) => output::note(format!("loaded {}", source.display()), verbosity),
        None => output::note("using default configuration", verbosity),
    }

    output::value(loaded.to_toml().context("Failed to render config")?.trim_end());
    Ok(())
}
