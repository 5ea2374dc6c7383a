//! engine::events
//!
//! Named notifications emitted by the store.
//!
//! # Architecture
//!
//! The store does not implement an event bus. It hands each [`StoreEvent`] to
//! an [`EventSink`] supplied by the embedding application, which routes it to
//! whatever bus, logger, or UI layer it uses. Events are emitted only after all
//! store locks are released, so a sink may call back into the store.
//!
//! # Event Names
//!
//! | Constant | Name |
//! |----------|------|
//! | [`ASYNC_SUCCESS`] | `state:async-success` |
//! | [`ASYNC_ERROR`] | `state:async-error` |
//! | [`ASYNC_BATCH_SUCCESS`] | `state:async-batch-success` |
//! | [`BATCH_ERROR`] | `state:batch-error` |
//! | [`OPERATION_CANCELLED`] | `state:operation-cancelled` |
//! | [`ALL_OPERATIONS_CANCELLED`] | `state:all-operations-cancelled` |
//! | [`UNDO`] | `state:undo` |
//! | [`REDO`] | `state:redo` |

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::OperationId;

pub const ASYNC_SUCCESS: &str = "state:async-success";
pub const ASYNC_ERROR: &str = "state:async-error";
pub const ASYNC_BATCH_SUCCESS: &str = "state:async-batch-success";
pub const BATCH_ERROR: &str = "state:batch-error";
pub const OPERATION_CANCELLED: &str = "state:operation-cancelled";
pub const ALL_OPERATIONS_CANCELLED: &str = "state:all-operations-cancelled";
pub const UNDO: &str = "state:undo";
pub const REDO: &str = "state:redo";

/// An event emitted by the store.
///
/// Serialized with the event name as the `event` tag and camelCase payload
/// fields, matching what UI listeners consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum StoreEvent {
    /// An async write settled successfully and was applied.
    #[serde(rename = "state:async-success")]
    AsyncSuccess {
        path: String,
        value: Value,
        operation_id: OperationId,
        duration_ms: u64,
        timestamp: String,
    },

    /// An async write failed after all retries.
    #[serde(rename = "state:async-error")]
    AsyncError {
        path: String,
        error: String,
        operation_id: OperationId,
        duration_ms: u64,
        timestamp: String,
    },

    /// Every operation in a batch succeeded.
    #[serde(rename = "state:async-batch-success")]
    AsyncBatchSuccess {
        count: usize,
        results: Vec<Value>,
        duration_ms: u64,
        timestamp: String,
    },

    /// At least one operation in a batch failed.
    #[serde(rename = "state:batch-error")]
    BatchError {
        error: String,
        duration_ms: u64,
        timestamp: String,
    },

    /// A single tracked operation was cancelled.
    #[serde(rename = "state:operation-cancelled")]
    OperationCancelled {
        operation_id: OperationId,
        path: String,
        timestamp: String,
    },

    /// Every tracked operation was cancelled.
    #[serde(rename = "state:all-operations-cancelled")]
    AllOperationsCancelled { count: usize, timestamp: String },

    /// History moved one step back.
    #[serde(rename = "state:undo")]
    Undo {
        state: Value,
        history_index: usize,
        timestamp: String,
    },

    /// History moved one step forward.
    #[serde(rename = "state:redo")]
    Redo {
        state: Value,
        history_index: usize,
        timestamp: String,
    },
}

impl StoreEvent {
    pub fn async_success(
        path: impl Into<String>,
        value: Value,
        operation_id: OperationId,
        duration_ms: u64,
    ) -> Self {
        StoreEvent::AsyncSuccess {
            path: path.into(),
            value,
            operation_id,
            duration_ms,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn async_error(
        path: impl Into<String>,
        error: impl Into<String>,
        operation_id: OperationId,
        duration_ms: u64,
    ) -> Self {
        StoreEvent::AsyncError {
            path: path.into(),
            error: error.into(),
            operation_id,
            duration_ms,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn batch_success(results: Vec<Value>, duration_ms: u64) -> Self {
        StoreEvent::AsyncBatchSuccess {
            count: results.len(),
            results,
            duration_ms,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn batch_error(error: impl Into<String>, duration_ms: u64) -> Self {
        StoreEvent::BatchError {
            error: error.into(),
            duration_ms,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn operation_cancelled(operation_id: OperationId, path: impl Into<String>) -> Self {
        StoreEvent::OperationCancelled {
            operation_id,
            path: path.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn all_operations_cancelled(count: usize) -> Self {
        StoreEvent::AllOperationsCancelled {
            count,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn undo(state: Value, history_index: usize) -> Self {
        StoreEvent::Undo {
            state,
            history_index,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn redo(state: Value, history_index: usize) -> Self {
        StoreEvent::Redo {
            state,
            history_index,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// The event's wire name.
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::AsyncSuccess { .. } => ASYNC_SUCCESS,
            StoreEvent::AsyncError { .. } => ASYNC_ERROR,
            StoreEvent::AsyncBatchSuccess { .. } => ASYNC_BATCH_SUCCESS,
            StoreEvent::BatchError { .. } => BATCH_ERROR,
            StoreEvent::OperationCancelled { .. } => OPERATION_CANCELLED,
            StoreEvent::AllOperationsCancelled { .. } => ALL_OPERATIONS_CANCELLED,
            StoreEvent::Undo { .. } => UNDO,
            StoreEvent::Redo { .. } => REDO,
        }
    }

    /// The event's payload without the name tag.
    pub fn payload(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("event");
        }
        value
    }
}

/// Receiver for store events.
///
/// Implemented for any `Fn(&StoreEvent)` closure.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &StoreEvent);
}

impl<F> EventSink for F
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    fn emit(&self, event: &StoreEvent) {
        self(event)
    }
}

/// A sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<StoreEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    /// Names of all recorded events, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(StoreEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for EventRecorder {
    fn emit(&self, event: &StoreEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Optional sink shared by the store's components.
#[derive(Clone, Default)]
pub(crate) struct Emitter {
    sink: Option<Arc<dyn EventSink>>,
}

impl Emitter {
    pub(crate) fn new(sink: Option<Arc<dyn EventSink>>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        if let Some(sink) = &self.sink {
            tracing::trace!(event = event.name(), "emitting store event");
            sink.emit(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_match_constants() {
        let id = OperationId::from_string("op");
        let cases = [
            (StoreEvent::async_success("p", json!(1), id.clone(), 3), ASYNC_SUCCESS),
            (StoreEvent::async_error("p", "boom", id.clone(), 3), ASYNC_ERROR),
            (StoreEvent::batch_success(vec![], 1), ASYNC_BATCH_SUCCESS),
            (StoreEvent::batch_error("boom", 1), BATCH_ERROR),
            (StoreEvent::operation_cancelled(id, "p"), OPERATION_CANCELLED),
            (StoreEvent::all_operations_cancelled(2), ALL_OPERATIONS_CANCELLED),
            (StoreEvent::undo(json!({}), 0), UNDO),
            (StoreEvent::redo(json!({}), 1), REDO),
        ];
        for (event, name) in cases {
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn serialized_tag_is_event_name() {
        let event = StoreEvent::undo(json!({"score": 1}), 4);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], json!("state:undo"));
        assert_eq!(value["historyIndex"], json!(4));
        assert_eq!(value["state"], json!({"score": 1}));
    }

    #[test]
    fn payload_drops_tag() {
        let event = StoreEvent::async_success("score", json!(5), OperationId::from_string("x"), 12);
        let payload = event.payload();
        assert!(payload.get("event").is_none());
        assert_eq!(payload["path"], json!("score"));
        assert_eq!(payload["operationId"], json!("x"));
        assert_eq!(payload["durationMs"], json!(12));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let emitter = Emitter::new(Some(Arc::new(move |e: &StoreEvent| {
            captured.lock().push(e.name());
        })));
        emitter.emit(StoreEvent::all_operations_cancelled(0));
        assert_eq!(*seen.lock(), vec![ALL_OPERATIONS_CANCELLED]);
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = EventRecorder::new();
        recorder.emit(&StoreEvent::undo(json!({}), 0));
        recorder.emit(&StoreEvent::redo(json!({}), 1));
        assert_eq!(recorder.names(), vec![UNDO, REDO]);
        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
