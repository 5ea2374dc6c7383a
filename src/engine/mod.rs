//! engine
//!
//! The reactive state store and the components it composes.
//!
//! # Architecture
//!
//! [`Store`] owns the state tree and wires together:
//!
//! - [`subscriptions`] - path-keyed observers with deep-watch propagation
//! - [`history`] - bounded, branchable undo/redo snapshots
//! - [`async_ops`] - async writes with loading/error side channels, timeout,
//!   retry, batching, and cooperative cancellation
//! - [`monitor`] - operation counters and debounced memory estimates
//! - [`events`] - named notifications handed to an [`EventSink`]
//!
//! Validation and path handling are pure functions in [`crate::core`].
//!
//! # Write Lifecycle
//!
//! ```text
//! set -> validate -> apply -> history -> invalidate memory -> notify
//! set_async -> [loading] -> await/timeout/retry -> set -> [error path] -> event
//! ```
//!
//! # Invariants
//!
//! - A rejected write never changes the tree
//! - Callbacks and event sinks run with no store lock held
//! - A cancelled async write performs no further writes

pub mod async_ops;
pub mod events;
pub mod history;
pub mod monitor;
pub mod store;
pub mod subscriptions;

pub use async_ops::{
    AsyncConfig, AsyncCounters, AsyncOperationInfo, AsyncOptions, AsyncOrchestrator, AsyncValue,
    BatchOperation, BatchOptions, TaskError, TaskResult,
};
pub use events::{EventRecorder, EventSink, StoreEvent};
pub use history::{HistoryError, HistoryManager, HistoryMove};
pub use monitor::{MemoryUsage, MonitorConfig, PerformanceMonitor, Statistics};
pub use store::{SetOptions, StateAccess, Store, StoreBuilder, StoreError};
pub use subscriptions::{
    Callback, IntegrityIssue, SubscribeOptions, Subscription, SubscriptionError,
    SubscriptionRegistry,
};
