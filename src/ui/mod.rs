//! ui
//!
//! User-facing output for the `arcstate` tool.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display

pub mod output;
