//! engine::store
//!
//! The state store: a path-addressable JSON tree composed with validation,
//! subscriptions, history, async writes, and instrumentation.
//!
//! # Write pipeline
//!
//! A synchronous write runs, under the store lock:
//!
//! 1. validate against the schema (rejected writes leave the tree untouched)
//! 2. apply to a copy of the tree and swap it in
//! 3. append a history snapshot
//! 4. mark the memory estimate stale
//! 5. collect subscription notifications
//!
//! The lock is then released and the notifications delivered, so callbacks
//! and event sinks may call back into the store.
//!
//! # Locking
//!
//! The tree, history, and monitor share one lock. The subscription registry
//! has its own, always taken after the store lock. Nothing is held across an
//! `.await`.
//!
//! # Example
//!
//! ```
//! use arcade_state::engine::{Store, SubscribeOptions};
//! use serde_json::json;
//!
//! let store = Store::new(json!({"player": {"health": 100}}));
//! let sub = store
//!     .subscribe("player.health", |new, _old, _path| {
//!         println!("health is now {new:?}");
//!     }, SubscribeOptions::default())
//!     .unwrap();
//!
//! store.set("player.health", json!(80)).unwrap();
//! assert_eq!(store.get("player.health"), Some(json!(80)));
//!
//! store.undo().unwrap();
//! assert_eq!(store.get("player.health"), Some(json!(100)));
//! sub.unsubscribe();
//! ```

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use super::async_ops::{
    AsyncConfig, AsyncOperationInfo, AsyncOptions, AsyncOrchestrator, AsyncValue,
    BatchOperation, BatchOptions, TaskError,
};
use super::events::{Emitter, EventSink, StoreEvent};
use super::history::{HistoryError, HistoryManager};
use super::monitor::{MemoryUsage, MonitorConfig, PerformanceMonitor, Statistics};
use super::subscriptions::{
    deliver_all, Callback, IntegrityIssue, SubscribeOptions, Subscription, SubscriptionError,
    SubscriptionRegistry,
};
use crate::core::config::StoreConfig;
use crate::core::path::{get_value_by_path, set_value_by_path, PathError};
use crate::core::schema::Schema;
use crate::core::types::OperationId;
use crate::core::validate::{validate_batch, validate_state, validate_value, ValidationIssue};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed for '{path}': {message}")]
    Validation { path: String, message: String },

    #[error("batch validation failed: {}", join_issues(.0))]
    InvalidBatch(Vec<ValidationIssue>),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error("undo/redo called while history is disabled")]
    HistoryDisabled,

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },

    #[error("{message}")]
    Task {
        path: String,
        message: String,
        #[source]
        source: TaskError,
    },

    #[error("operation {operation_id} was cancelled")]
    Cancelled { operation_id: OperationId },
}

impl From<HistoryError> for StoreError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Disabled => StoreError::HistoryDisabled,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Shallow-merge an object value into the existing object.
    pub merge: bool,
    pub skip_validation: bool,
    /// Do not record a history snapshot.
    pub skip_history: bool,
    /// Do not notify subscribers.
    pub silent: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self {
            merge: true,
            ..Self::default()
        }
    }

    /// Options for loading/error flag writes, which stay out of history.
    pub fn side_channel() -> Self {
        Self {
            skip_history: true,
            ..Self::default()
        }
    }
}

/// Read/write access to a state tree.
///
/// The async orchestrator writes through this trait so it does not depend on
/// a concrete store.
pub trait StateAccess: Send + Sync {
    fn set_state(&self, path: &str, value: Value, options: &SetOptions) -> Result<(), StoreError>;
    fn get_state(&self, path: &str) -> Option<Value>;
}

struct Core {
    tree: Value,
    history: HistoryManager,
    monitor: PerformanceMonitor,
}

struct Shared {
    core: Mutex<Core>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    orchestrator: AsyncOrchestrator,
    schema: Schema,
    config: StoreConfig,
    events: Emitter,
}

/// Builder for [`Store`].
#[derive(Default)]
pub struct StoreBuilder {
    state: Option<Value>,
    schema: Schema,
    config: StoreConfig,
    sink: Option<Arc<dyn EventSink>>,
}

impl StoreBuilder {
    /// Initial tree. Defaults to an empty object.
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Receiver for store events. Ignored when events are disabled.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Store {
        let tree = self
            .state
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let config = self.config;

        let mut history = HistoryManager::new(config.enable_history, config.max_history_size);
        history.initialize(&tree);

        let events = if config.enable_events {
            Emitter::new(self.sink)
        } else {
            Emitter::default()
        };

        tracing::debug!(
            history = config.enable_history,
            max_history = config.max_history_size,
            rules = self.schema.len(),
            "store created"
        );

        Store {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    tree,
                    history,
                    monitor: PerformanceMonitor::new(MonitorConfig::from(&config)),
                }),
                registry: Arc::new(Mutex::new(SubscriptionRegistry::new())),
                orchestrator: AsyncOrchestrator::with_emitter(
                    AsyncConfig::from(&config),
                    events.clone(),
                ),
                schema: self.schema,
                config,
                events,
            }),
        }
    }
}

/// The state store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

impl Default for Store {
    fn default() -> Self {
        Store::builder().build()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// A store over `state` with no schema and default configuration.
    pub fn new(state: Value) -> Self {
        Store::builder().state(state).build()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Copy of the value at `path`, or `None` if absent.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut core = self.shared.core.lock();
        core.monitor.record_get();
        get_value_by_path(&core.tree, path).cloned()
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        let mut core = self.shared.core.lock();
        core.monitor.record_get();
        core.tree.clone()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Validate and write `value` at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if a schema rule rejects the value, or
    /// `StoreError::Path` if `path` cannot be written. The tree is unchanged.
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.set_with(path, value, &SetOptions::default())
    }

    /// [`Store::set`] with explicit options.
    pub fn set_with(&self, path: &str, value: Value, options: &SetOptions) -> Result<(), StoreError> {
        let started = Instant::now();
        let shared = &*self.shared;

        let notifications = {
            let mut guard = shared.core.lock();
            let core = &mut *guard;

            if !options.skip_validation {
                if let Some(message) = validate_value(&shared.schema, path, &value, &core.tree) {
                    core.monitor.record_validation_error();
                    tracing::warn!(path, error = %message, "rejected invalid write");
                    return Err(StoreError::Validation {
                        path: path.to_string(),
                        message,
                    });
                }
            }

            let next = set_value_by_path(&core.tree, path, value, options.merge)?;
            let old = get_value_by_path(&core.tree, path).cloned();
            core.tree = next;
            if !options.skip_history {
                core.history.add_state(&core.tree);
            }
            core.monitor.invalidate_memory_cache();
            core.monitor.record_update(started.elapsed());

            if options.silent {
                Vec::new()
            } else {
                let new = get_value_by_path(&core.tree, path);
                shared
                    .registry
                    .lock()
                    .collect(path, new, old.as_ref(), &core.tree)
            }
        };

        if shared.config.enable_debug {
            tracing::debug!(path, notified = notifications.len(), "state updated");
        }
        deliver_all(notifications);
        Ok(())
    }

    /// Apply several writes atomically with a single history entry.
    ///
    /// Every write is validated against the current tree first. If any is
    /// rejected nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidBatch` with every rejected write, or
    /// `StoreError::Path` if a path cannot be written.
    pub fn set_many<I, P>(&self, writes: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (P, Value)>,
        P: Into<String>,
    {
        let writes: Vec<(String, Value)> = writes
            .into_iter()
            .map(|(path, value)| (path.into(), value))
            .collect();
        if writes.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let shared = &*self.shared;

        let notifications = {
            let mut guard = shared.core.lock();
            let core = &mut *guard;

            let issues = validate_batch(
                &shared.schema,
                writes.iter().map(|(path, value)| (path.as_str(), value)),
                &core.tree,
            );
            if !issues.is_empty() {
                core.monitor.record_validation_errors(issues.len());
                tracing::warn!(rejected = issues.len(), "rejected invalid batch");
                return Err(StoreError::InvalidBatch(issues));
            }

            let mut next = core.tree.clone();
            let mut paths: Vec<String> = Vec::with_capacity(writes.len());
            for (path, value) in writes {
                next = set_value_by_path(&next, &path, value, false)?;
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
            let before = std::mem::replace(&mut core.tree, next);
            core.history.add_state(&core.tree);
            core.monitor.invalidate_memory_cache();
            core.monitor.record_update(started.elapsed());

            let registry = shared.registry.lock();
            paths
                .iter()
                .flat_map(|path| {
                    registry.collect(
                        path,
                        get_value_by_path(&core.tree, path),
                        get_value_by_path(&before, path),
                        &core.tree,
                    )
                })
                .collect::<Vec<_>>()
        };

        deliver_all(notifications);
        Ok(())
    }

    /// Replace the whole tree.
    ///
    /// Subscribers whose observed value changed are notified.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidBatch` if the new tree violates the schema.
    pub fn reset(&self, state: Value) -> Result<(), StoreError> {
        let shared = &*self.shared;
        let notifications = {
            let mut guard = shared.core.lock();
            let core = &mut *guard;

            let issues = validate_state(&shared.schema, &state);
            if !issues.is_empty() {
                core.monitor.record_validation_errors(issues.len());
                tracing::warn!(rejected = issues.len(), "rejected invalid reset");
                return Err(StoreError::InvalidBatch(issues));
            }

            let before = std::mem::replace(&mut core.tree, state);
            core.history.add_state(&core.tree);
            core.monitor.invalidate_memory_cache();
            shared.registry.lock().collect_changed(&before, &core.tree)
        };

        tracing::debug!(notified = notifications.len(), "state reset");
        deliver_all(notifications);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Observe `path`.
    ///
    /// The callback receives `(new_value, old_value, path)`. With `immediate`
    /// it is called once before this returns, with the current value and no
    /// old value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Subscription` for empty or malformed paths.
    pub fn subscribe<F>(
        &self,
        path: &str,
        callback: F,
        options: SubscribeOptions,
    ) -> Result<Subscription, StoreError>
    where
        F: Fn(Option<&Value>, Option<&Value>, &str) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let (id, immediate) = {
            let core = self.shared.core.lock();
            let mut registry = self.shared.registry.lock();
            let id = registry.add(path, callback, options)?;
            let immediate = if options.immediate {
                registry.immediate_notification(id, &core.tree)
            } else {
                None
            };
            (id, immediate)
        };

        if let Some(notification) = immediate {
            notification.deliver();
        }
        Ok(Subscription::new(id, &self.shared.registry))
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Index/list consistency problems in the subscription registry.
    pub fn check_subscription_integrity(&self) -> Vec<IntegrityIssue> {
        self.shared.registry.lock().check_integrity()
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Step back one snapshot and apply it.
    ///
    /// Returns the restored tree, or `None` at the oldest snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::HistoryDisabled` when history is off.
    pub fn undo(&self) -> Result<Option<Value>, StoreError> {
        self.travel(true)
    }

    /// Step forward one snapshot and apply it.
    ///
    /// Returns the restored tree, or `None` at the newest snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::HistoryDisabled` when history is off.
    pub fn redo(&self) -> Result<Option<Value>, StoreError> {
        self.travel(false)
    }

    fn travel(&self, back: bool) -> Result<Option<Value>, StoreError> {
        let shared = &*self.shared;
        let (step, notifications) = {
            let mut guard = shared.core.lock();
            let core = &mut *guard;

            let step = if back {
                core.history.undo()?
            } else {
                core.history.redo()?
            };
            let Some(step) = step else {
                return Ok(None);
            };

            core.monitor.record_history_operation();
            core.monitor.invalidate_memory_cache();
            let before = std::mem::replace(&mut core.tree, step.state.clone());
            let notifications = shared.registry.lock().collect_changed(&before, &core.tree);
            (step, notifications)
        };

        tracing::debug!(index = step.index, undo = back, "history moved");
        deliver_all(notifications);
        let event = if back {
            StoreEvent::undo(step.state.clone(), step.index)
        } else {
            StoreEvent::redo(step.state.clone(), step.index)
        };
        shared.events.emit(event);
        Ok(Some(step.state))
    }

    pub fn can_undo(&self) -> bool {
        self.shared.core.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.core.lock().history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.shared.core.lock().history.len()
    }

    /// Cursor into the history log, `None` when the log is empty.
    pub fn history_index(&self) -> Option<usize> {
        self.shared.core.lock().history.cursor()
    }

    /// Drop all history and re-seed it with the current tree.
    pub fn clear_history(&self) {
        let mut guard = self.shared.core.lock();
        let core = &mut *guard;
        core.history.initialize(&core.tree);
        core.monitor.invalidate_memory_cache();
    }

    // ------------------------------------------------------------------
    // Async
    // ------------------------------------------------------------------

    /// Write `value` to `path` once it resolves.
    ///
    /// See [`AsyncOrchestrator::set_state_async`].
    pub async fn set_async(
        &self,
        path: &str,
        value: impl Into<AsyncValue>,
        options: AsyncOptions,
    ) -> Result<Value, StoreError> {
        self.shared
            .orchestrator
            .set_state_async(self, path, value.into(), options)
            .await
    }

    /// Run several async writes.
    ///
    /// See [`AsyncOrchestrator::batch_set_state_async`].
    pub async fn batch_set_async(
        &self,
        operations: Vec<BatchOperation>,
        options: BatchOptions,
    ) -> Result<Vec<Value>, StoreError> {
        self.shared
            .orchestrator
            .batch_set_state_async(self, operations, options)
            .await
    }

    pub fn cancel_operation(&self, id: &OperationId) -> bool {
        self.shared.orchestrator.cancel_operation(self, id)
    }

    pub fn cancel_all_operations(&self) -> usize {
        self.shared.orchestrator.cancel_all_operations(self)
    }

    pub fn active_operations(&self) -> Vec<AsyncOperationInfo> {
        self.shared.orchestrator.active_operations()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check `value` for `path` against the current tree without writing.
    pub fn validate(&self, path: &str, value: &Value) -> Option<String> {
        let core = self.shared.core.lock();
        validate_value(&self.shared.schema, path, value, &core.tree)
    }

    /// Check every ruled path present in the current tree.
    pub fn validate_state(&self) -> Vec<ValidationIssue> {
        let core = self.shared.core.lock();
        validate_state(&self.shared.schema, &core.tree)
    }

    // ------------------------------------------------------------------
    // Instrumentation
    // ------------------------------------------------------------------

    pub fn statistics(&self) -> Statistics {
        let (mut stats, history_size) = {
            let core = self.shared.core.lock();
            (core.monitor.statistics(), core.history.len())
        };
        let counters = self.shared.orchestrator.counters();
        stats.timeouts = counters.timeouts;
        stats.retries = counters.retries;
        stats.async_started = counters.started;
        stats.async_completed = counters.completed;
        stats.async_failed = counters.failed;
        stats.async_cancelled = counters.cancelled;
        stats.history_size = history_size;
        stats.active_subscriptions = self.shared.registry.lock().len();
        stats
    }

    pub fn reset_statistics(&self) {
        self.shared.core.lock().monitor.reset_statistics();
        self.shared.orchestrator.reset_counters();
    }

    /// Debounced memory estimate; `None` when memory tracking is off.
    pub fn memory_usage(&self) -> Option<MemoryUsage> {
        let mut guard = self.shared.core.lock();
        let Core {
            tree,
            history,
            monitor,
        } = &mut *guard;
        monitor.memory_usage(tree, || history.memory_usage())
    }

    /// Measure memory now, ignoring the debounce.
    pub fn force_memory_update(&self) -> Option<MemoryUsage> {
        let mut guard = self.shared.core.lock();
        let Core {
            tree,
            history,
            monitor,
        } = &mut *guard;
        monitor.force_memory_update(tree, || history.memory_usage())
    }
}

impl StateAccess for Store {
    fn set_state(&self, path: &str, value: Value, options: &SetOptions) -> Result<(), StoreError> {
        self.set_with(path, value, options)
    }

    fn get_state(&self, path: &str) -> Option<Value> {
        self.get(path)
    }
}
