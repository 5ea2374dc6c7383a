//! core
//!
//! Pure building blocks of the state store.
//!
//! # Modules
//!
//! - [`types`] - Strong identifier types
//! - [`path`] - Dot-path get/set, structural equality
//! - [`reference`] - Bound references into the live state
//! - [`schema`] - Validation rule schema
//! - [`validate`] - Stateless validation of candidate writes
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing here holds mutable state or performs I/O except config loading
//! - Failures are values (`Option<String>`, `Result`), never panics

pub mod config;
pub mod path;
pub mod reference;
pub mod schema;
pub mod types;
pub mod validate;
