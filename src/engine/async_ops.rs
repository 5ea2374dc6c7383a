//! engine::async_ops
//!
//! Async state mutation with loading/error side channels, timeout, retry,
//! batching, and cancellation.
//!
//! # Design
//!
//! The orchestrator never owns state. Every write goes through a
//! [`StateAccess`] supplied per call, so the same machinery drives the real
//! store and test doubles.
//!
//! A value to write is an [`AsyncValue`]:
//! - `Ready` is written immediately, with no tracking
//! - `Pending` is a single future, awaited once
//! - `Factory` produces a fresh future per attempt and is the only form that
//!   can be retried
//!
//! # Lifecycle of a tracked operation
//!
//! ```text
//! track -> loading=true -> attempt [-> timeout] [-> retry delay -> attempt]...
//!       -> (cancelled? stop) -> write value | write error -> untrack,
//!          loading=false -> event
//! ```
//!
//! # Cancellation
//!
//! Cancelling marks the operation, clears its loading flag, untracks it, and
//! emits an event. The in-flight future is not aborted. The operation checks
//! its flag after every suspension point and, once cancelled, performs no
//! further writes and resolves to [`StoreError::Cancelled`].
//!
//! Dropping an operation's future before it settles untracks it and clears its
//! loading flag.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use super::events::{Emitter, EventSink, StoreEvent};
use super::store::{SetOptions, StateAccess, StoreError};
use crate::core::config::StoreConfig;
use crate::core::types::OperationId;

/// Outcome of one attempt of an async task.
pub type TaskResult = Result<Value, TaskError>;

/// Produces a fresh future for each attempt.
pub type TaskFactory = Box<dyn FnMut() -> BoxFuture<'static, TaskResult> + Send>;

/// Failure reported by an async task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A plain message.
    #[error("{0}")]
    Message(String),

    /// An underlying error.
    #[error("{0}")]
    Failed(Box<dyn std::error::Error + Send + Sync>),

    /// A failure with nothing to report.
    #[error("Unknown error")]
    Unknown,
}

impl TaskError {
    pub fn message(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }

    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        TaskError::Failed(Box::new(error))
    }

    /// The message stored in an error path.
    ///
    /// Messages pass through unchanged; errors contribute their display text;
    /// anything without text becomes `"Unknown error"`.
    pub fn normalized_message(&self) -> String {
        match self {
            TaskError::Message(message) => message.clone(),
            TaskError::Failed(error) => {
                let text = error.to_string();
                if text.is_empty() {
                    "Unknown error".to_string()
                } else {
                    text
                }
            }
            TaskError::Unknown => "Unknown error".to_string(),
        }
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError::Message(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError::Message(message.to_string())
    }
}

/// A value to write, possibly not yet available.
pub enum AsyncValue {
    Ready(Value),
    Pending(BoxFuture<'static, TaskResult>),
    Factory(TaskFactory),
}

impl AsyncValue {
    pub fn ready(value: impl Into<Value>) -> Self {
        AsyncValue::Ready(value.into())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        AsyncValue::Pending(future.boxed())
    }

    pub fn factory<F, Fut>(mut make: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        AsyncValue::Factory(Box::new(move || make().boxed()))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AsyncValue::Ready(_))
    }
}

impl From<Value> for AsyncValue {
    fn from(value: Value) -> Self {
        AsyncValue::Ready(value)
    }
}

impl std::fmt::Debug for AsyncValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsyncValue::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            AsyncValue::Pending(_) => f.write_str("Pending"),
            AsyncValue::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Per-operation options.
#[derive(Debug, Clone, Default)]
pub struct AsyncOptions {
    /// Set `true` while in flight, `false` once settled.
    pub loading_path: Option<String>,
    /// Receives the failure message, cleared to `null` on success.
    pub error_path: Option<String>,
    /// Per-attempt timeout; falls back to the configured default.
    pub timeout: Option<Duration>,
    /// Retries after the first attempt; falls back to the configured default.
    pub retry_attempts: Option<u32>,
    /// Delay between attempts; falls back to the configured default.
    pub retry_delay: Option<Duration>,
    /// Options for the final write.
    pub set: SetOptions,
}

impl AsyncOptions {
    pub fn loading_path(mut self, path: impl Into<String>) -> Self {
        self.loading_path = Some(path.into());
        self
    }

    pub fn error_path(mut self, path: impl Into<String>) -> Self {
        self.error_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn set_options(mut self, set: SetOptions) -> Self {
        self.set = set;
        self
    }
}

/// One entry of a batch.
#[derive(Debug)]
pub struct BatchOperation {
    pub path: String,
    pub value: AsyncValue,
    pub options: AsyncOptions,
}

impl BatchOperation {
    pub fn new(path: impl Into<String>, value: impl Into<AsyncValue>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            options: AsyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AsyncOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Run operations one at a time in order instead of concurrently.
    pub sequential: bool,
    pub loading_path: Option<String>,
    pub error_path: Option<String>,
}

/// Defaults applied to operations that do not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncConfig {
    pub default_timeout: Option<Duration>,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub debug: bool,
}

impl From<&StoreConfig> for AsyncConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
            debug: config.enable_debug,
        }
    }
}

/// Async operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsyncCounters {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timeouts: u64,
    pub retries: u64,
}

/// Public view of an in-flight operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncOperationInfo {
    pub id: OperationId,
    pub path: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

struct TrackedOperation {
    path: String,
    loading_path: Option<String>,
    started: Instant,
    started_at: DateTime<Utc>,
    cancelled: Arc<AtomicBool>,
}

type OperationTable = Mutex<HashMap<OperationId, TrackedOperation>>;

/// Untracks its operation on drop and clears the loading flag if the
/// operation was still tracked.
struct OperationGuard<'a> {
    id: OperationId,
    operations: &'a OperationTable,
    access: &'a dyn StateAccess,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let removed = self.operations.lock().remove(&self.id);
        if let Some(loading) = removed.and_then(|op| op.loading_path) {
            write_side_channel(self.access, &loading, Value::Bool(false));
        }
    }
}

enum TaskSource {
    Once(Option<BoxFuture<'static, TaskResult>>),
    Factory(TaskFactory),
}

impl TaskSource {
    fn next_task(&mut self) -> Option<BoxFuture<'static, TaskResult>> {
        match self {
            TaskSource::Once(future) => future.take(),
            TaskSource::Factory(make) => Some(make()),
        }
    }

    fn can_retry(&self) -> bool {
        matches!(self, TaskSource::Factory(_))
    }
}

/// Tracks and drives async writes.
pub struct AsyncOrchestrator {
    config: AsyncConfig,
    operations: OperationTable,
    counters: Mutex<AsyncCounters>,
    events: Emitter,
}

impl AsyncOrchestrator {
    pub fn new(config: AsyncConfig, sink: Option<Arc<dyn EventSink>>) -> Self {
        Self::with_emitter(config, Emitter::new(sink))
    }

    pub(crate) fn with_emitter(config: AsyncConfig, events: Emitter) -> Self {
        Self {
            config,
            operations: Mutex::new(HashMap::new()),
            counters: Mutex::new(AsyncCounters::default()),
            events,
        }
    }

    /// Write `value` to `path` once it is available.
    ///
    /// # Errors
    ///
    /// - `StoreError::Timeout` if the last attempt timed out
    /// - `StoreError::Task` if the last attempt failed
    /// - `StoreError::Cancelled` if the operation was cancelled
    /// - any error from the final write (e.g., validation)
    pub async fn set_state_async(
        &self,
        access: &dyn StateAccess,
        path: &str,
        value: AsyncValue,
        options: AsyncOptions,
    ) -> Result<Value, StoreError> {
        let mut source = match value {
            AsyncValue::Ready(value) => {
                access.set_state(path, value.clone(), &options.set)?;
                return Ok(value);
            }
            AsyncValue::Pending(future) => TaskSource::Once(Some(future)),
            AsyncValue::Factory(make) => TaskSource::Factory(make),
        };

        let (guard, cancelled) = self.track(access, path, options.loading_path.clone());
        let operation_id = guard.id.clone();
        if let Some(loading) = &options.loading_path {
            write_side_channel(access, loading, Value::Bool(true));
        }
        if self.config.debug {
            tracing::debug!(operation = %operation_id, path, "async operation started");
        }
        let started = Instant::now();

        let outcome = self.drive(&mut source, path, &options, &cancelled).await;
        if cancelled.load(Ordering::Acquire) {
            tracing::debug!(operation = %operation_id, path, "discarding result of cancelled operation");
            return Err(StoreError::Cancelled { operation_id });
        }

        let outcome = outcome.and_then(|value| {
            access
                .set_state(path, value.clone(), &options.set)
                .map(|()| value)
        });
        if let Some(error_path) = &options.error_path {
            let recorded = match &outcome {
                Ok(_) => Value::Null,
                Err(err) => Value::String(err.to_string()),
            };
            write_side_channel(access, error_path, recorded);
        }
        drop(guard);

        let duration_ms = millis(started.elapsed());
        match outcome {
            Ok(value) => {
                self.counters.lock().completed += 1;
                self.events.emit(StoreEvent::async_success(
                    path,
                    value.clone(),
                    operation_id,
                    duration_ms,
                ));
                Ok(value)
            }
            Err(err) => {
                self.counters.lock().failed += 1;
                tracing::warn!(operation = %operation_id, path, error = %err, "async operation failed");
                self.events.emit(StoreEvent::async_error(
                    path,
                    err.to_string(),
                    operation_id,
                    duration_ms,
                ));
                Err(err)
            }
        }
    }

    /// Run several async writes as one unit.
    ///
    /// Concurrent batches let every operation settle and then report the
    /// first failure in input order. Sequential batches stop at the first
    /// failure. An empty batch succeeds immediately without side effects.
    pub async fn batch_set_state_async(
        &self,
        access: &dyn StateAccess,
        operations: Vec<BatchOperation>,
        batch: BatchOptions,
    ) -> Result<Vec<Value>, StoreError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(loading) = &batch.loading_path {
            write_side_channel(access, loading, Value::Bool(true));
        }
        let started = Instant::now();

        let outcome = if batch.sequential {
            self.run_sequential(access, operations).await
        } else {
            self.run_concurrent(access, operations).await
        };

        if let Some(loading) = &batch.loading_path {
            write_side_channel(access, loading, Value::Bool(false));
        }
        let duration_ms = millis(started.elapsed());

        match outcome {
            Ok(results) => {
                if let Some(error_path) = &batch.error_path {
                    write_side_channel(access, error_path, Value::Null);
                }
                self.events
                    .emit(StoreEvent::batch_success(results.clone(), duration_ms));
                Ok(results)
            }
            Err(err) => {
                let message = err.to_string();
                if let Some(error_path) = &batch.error_path {
                    write_side_channel(access, error_path, Value::String(message.clone()));
                }
                self.events.emit(StoreEvent::batch_error(message, duration_ms));
                Err(err)
            }
        }
    }

    async fn run_sequential(
        &self,
        access: &dyn StateAccess,
        operations: Vec<BatchOperation>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            results.push(
                self.set_state_async(access, &op.path, op.value, op.options)
                    .await?,
            );
        }
        Ok(results)
    }

    async fn run_concurrent(
        &self,
        access: &dyn StateAccess,
        operations: Vec<BatchOperation>,
    ) -> Result<Vec<Value>, StoreError> {
        let pending = operations.into_iter().map(|op| async move {
            self.set_state_async(access, &op.path, op.value, op.options)
                .await
        });
        join_all(pending).await.into_iter().collect()
    }

    /// Cancel one operation. Returns `false` if it is not tracked.
    pub fn cancel_operation(&self, access: &dyn StateAccess, id: &OperationId) -> bool {
        let Some(op) = self.operations.lock().remove(id) else {
            return false;
        };
        self.mark_cancelled(access, &op);
        self.events
            .emit(StoreEvent::operation_cancelled(id.clone(), op.path));
        true
    }

    /// Cancel every tracked operation. Returns how many were cancelled.
    pub fn cancel_all_operations(&self, access: &dyn StateAccess) -> usize {
        let drained: Vec<TrackedOperation> = self
            .operations
            .lock()
            .drain()
            .map(|(_, op)| op)
            .collect();
        for op in &drained {
            self.mark_cancelled(access, op);
        }
        self.events
            .emit(StoreEvent::all_operations_cancelled(drained.len()));
        drained.len()
    }

    fn mark_cancelled(&self, access: &dyn StateAccess, op: &TrackedOperation) {
        op.cancelled.store(true, Ordering::Release);
        if let Some(loading) = &op.loading_path {
            write_side_channel(access, loading, Value::Bool(false));
        }
        self.counters.lock().cancelled += 1;
    }

    /// Snapshot of in-flight operations, oldest first.
    pub fn active_operations(&self) -> Vec<AsyncOperationInfo> {
        let mut active: Vec<AsyncOperationInfo> = self
            .operations
            .lock()
            .iter()
            .map(|(id, op)| AsyncOperationInfo {
                id: id.clone(),
                path: op.path.clone(),
                started_at: op.started_at,
                elapsed: op.started.elapsed(),
            })
            .collect();
        active.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        active
    }

    pub fn active_count(&self) -> usize {
        self.operations.lock().len()
    }

    pub fn counters(&self) -> AsyncCounters {
        *self.counters.lock()
    }

    pub fn reset_counters(&self) {
        *self.counters.lock() = AsyncCounters::default();
    }

    fn track<'a>(
        &'a self,
        access: &'a dyn StateAccess,
        path: &str,
        loading_path: Option<String>,
    ) -> (OperationGuard<'a>, Arc<AtomicBool>) {
        let id = OperationId::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.operations.lock().insert(
            id.clone(),
            TrackedOperation {
                path: path.to_string(),
                loading_path,
                started: Instant::now(),
                started_at: Utc::now(),
                cancelled: Arc::clone(&cancelled),
            },
        );
        self.counters.lock().started += 1;

        let guard = OperationGuard {
            id,
            operations: &self.operations,
            access,
        };
        (guard, cancelled)
    }

    async fn drive(
        &self,
        source: &mut TaskSource,
        path: &str,
        options: &AsyncOptions,
        cancelled: &AtomicBool,
    ) -> Result<Value, StoreError> {
        let retries = options.retry_attempts.unwrap_or(self.config.retry_attempts);
        let delay = options.retry_delay.unwrap_or(self.config.retry_delay);
        let timeout = options.timeout.or(self.config.default_timeout);

        let mut attempt = 0;
        loop {
            let Some(task) = source.next_task() else {
                return Err(StoreError::Task {
                    path: path.to_string(),
                    message: TaskError::Unknown.normalized_message(),
                    source: TaskError::Unknown,
                });
            };

            let err = match self.attempt(task, path, timeout).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= retries || !source.can_retry() || cancelled.load(Ordering::Acquire) {
                return Err(err);
            }

            attempt += 1;
            self.counters.lock().retries += 1;
            tracing::debug!(path, attempt, error = %err, "retrying async operation");
            tokio::time::sleep(delay).await;
            if cancelled.load(Ordering::Acquire) {
                return Err(err);
            }
        }
    }

    async fn attempt(
        &self,
        task: BoxFuture<'static, TaskResult>,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, StoreError> {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(result) => result,
                Err(_) => {
                    self.counters.lock().timeouts += 1;
                    return Err(StoreError::Timeout {
                        path: path.to_string(),
                        timeout_ms: millis(limit),
                    });
                }
            },
            None => task.await,
        };
        result.map_err(|source| StoreError::Task {
            path: path.to_string(),
            message: source.normalized_message(),
            source,
        })
    }
}

fn write_side_channel(access: &dyn StateAccess, path: &str, value: Value) {
    if let Err(e) = access.set_state(path, value, &SetOptions::side_channel()) {
        tracing::warn!(path, error = %e, "failed to update side-channel path");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
