//! arcade-state - reactive state management for an arcade shooter
//!
//! A single, path-addressable source of truth shared by every game subsystem
//! (player, enemies, UI, audio settings). The store validates writes against a
//! schema, notifies observers, keeps branchable undo/redo history, applies
//! async writes with timeout/retry/cancellation, and tracks its own cost.
//!
//! # Architecture
//!
//! - [`core`] - Pure building blocks: paths, schemas, validation, config
//! - [`engine`] - The [`engine::Store`] and the components it composes
//! - [`cli`] - The `arcstate` developer tool
//! - [`ui`] - Terminal output helpers for the CLI
//!
//! # Correctness Invariants
//!
//! 1. A write rejected by validation never changes the tree
//! 2. Unsubscribing is O(1) and the subscription index always matches its lists
//! 3. History never exceeds its capacity and a new write discards the redo branch
//! 4. A cancelled async write performs no further writes
//!
//! # Example
//!
//! ```
//! use arcade_state::core::schema::Schema;
//! use arcade_state::engine::Store;
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "player": {"health": {"type": "number", "min": 0, "max": "maxHealth"}}
//! })).unwrap();
//!
//! let store = Store::builder()
//!     .state(json!({"player": {"health": 100, "maxHealth": 100}}))
//!     .schema(schema)
//!     .build();
//!
//! assert!(store.set("player.health", json!(150)).is_err());
//! assert!(store.set("player.health", json!(60)).is_ok());
//! ```

pub mod cli;
pub mod core;
pub mod engine;
pub mod ui;
