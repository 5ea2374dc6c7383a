//! get command - Print the value at a dot-path

use super::read_json;
use crate::cli::Context;
use crate::engine::Store;
use crate::ui::output;
use anyhow::{bail, Result};
use std::path::Path;

/// Print the JSON value at `path` in the snapshot.
///
/// Values are printed even in quiet mode since they are the command's output.
pub fn get(_ctx: &Context, state_path: &Path, path: &str) -> Result<()> {
    let store = Store::new(read_json(state_path)?);

    let Some(value) = store.get(path) else {
        bail!("No value at path '{}'", path);
    };
    output::value(serde_json::to_string_pretty(&value)?);
    Ok(())
}
