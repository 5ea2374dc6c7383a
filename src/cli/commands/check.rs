//! check command - Validate a state snapshot against a schema

use super::read_json;
use crate::cli::Context;
use crate::core::schema::Schema;
use crate::engine::Store;
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};
use std::path::Path;

/// Validate `state_path` against `schema_path`.
///
/// Prints one line per issue and fails if there were any.
pub fn check(ctx: &Context, schema_path: &Path, state_path: &Path) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let document = read_json(schema_path)?;
    let schema = Schema::from_value(&document)
        .with_context(|| format!("Invalid schema '{}'", schema_path.display()))?;
    let state = read_json(state_path)?;

    output::note(format!("checking {} rule(s)", schema.len()), verbosity);

    let store = Store::builder().state(state).schema(schema).build();
    let issues = store.validate_state();

    if issues.is_empty() {
        output::status("ok", verbosity);
        return Ok(());
    }

    output::issues(&issues, verbosity);
    bail!("{} validation issue(s) in '{}'", issues.len(), state_path.display())
}
