//! engine::monitor
//!
//! Operation counters and debounced memory estimation.
//!
//! # Statistics
//!
//! Counters for gets, updates (with a running mean latency), validation
//! errors, and history moves. Turning off performance tracking freezes them.
//!
//! # Memory
//!
//! Measuring the tree is comparatively expensive, so the estimate is cached.
//! Writes only mark the cache stale; a stale cache is still served until
//! `memory_update_threshold` has elapsed since the last measurement. Use
//! [`PerformanceMonitor::force_memory_update`] to bypass the debounce.
//!
//! Small trees are walked structurally. Once the walk exceeds a node budget
//! the serialized JSON length is used instead. Sizing never fails; a tree
//! that cannot be measured counts as zero bytes.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::core::config::StoreConfig;

/// Nodes visited before falling back to the serialized-length estimate.
const STRUCTURAL_NODE_BUDGET: usize = 10_000;

/// Nesting depth beyond which the structural walk gives up.
const MAX_STRUCTURAL_DEPTH: usize = 128;

/// Monitor switches and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub memory_tracking: bool,
    pub performance_tracking: bool,
    pub update_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for MonitorConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            memory_tracking: config.enable_memory_tracking,
            performance_tracking: config.enable_performance_tracking,
            update_threshold: config.memory_update_threshold(),
        }
    }
}

/// Snapshot of the store's running counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_updates: u64,
    pub total_gets: u64,
    pub validation_errors: u64,
    pub history_operations: u64,
    /// Mean wall time of a synchronous write, in milliseconds.
    pub average_update_time_ms: f64,
    pub timeouts: u64,
    pub retries: u64,
    pub async_started: u64,
    pub async_completed: u64,
    pub async_failed: u64,
    pub async_cancelled: u64,
    pub active_subscriptions: usize,
    pub history_size: usize,
}

/// Estimated memory footprint in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub state_bytes: usize,
    pub history_bytes: usize,
    pub total_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
struct CachedUsage {
    usage: MemoryUsage,
    measured_at: Instant,
}

/// Counters and the memory cache for one store.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    stats: Statistics,
    cache: Option<CachedUsage>,
    stale: bool,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            stats: Statistics::default(),
            cache: None,
            stale: true,
        }
    }

    pub fn record_get(&mut self) {
        if self.config.performance_tracking {
            self.stats.total_gets += 1;
        }
    }

    /// Count a write and fold its latency into the running mean.
    pub fn record_update(&mut self, elapsed: Duration) {
        if !self.config.performance_tracking {
            return;
        }
        self.stats.total_updates += 1;
        let sample = elapsed.as_secs_f64() * 1_000.0;
        let n = self.stats.total_updates as f64;
        self.stats.average_update_time_ms += (sample - self.stats.average_update_time_ms) / n;
    }

    pub fn record_validation_error(&mut self) {
        self.record_validation_errors(1);
    }

    /// Count one validation error per rejected path.
    pub fn record_validation_errors(&mut self, count: usize) {
        if self.config.performance_tracking {
            self.stats.validation_errors += count as u64;
        }
    }

    pub fn record_history_operation(&mut self) {
        if self.config.performance_tracking {
            self.stats.history_operations += 1;
        }
    }

    /// Current counters.
    pub fn statistics(&self) -> Statistics {
        self.stats.clone()
    }

    pub fn reset_statistics(&mut self) {
        self.stats = Statistics::default();
    }

    /// Mark the cached estimate stale without measuring.
    pub fn invalidate_memory_cache(&mut self) {
        self.stale = true;
    }

    /// Memory estimate, re-measured only when stale and past the threshold.
    ///
    /// Returns `None` when memory tracking is disabled.
    pub fn memory_usage(
        &mut self,
        state: &Value,
        history_bytes: impl FnOnce() -> usize,
    ) -> Option<MemoryUsage> {
        if !self.config.memory_tracking {
            return None;
        }
        if let Some(cached) = self.cache {
            let fresh = cached.measured_at.elapsed() < self.config.update_threshold;
            if !self.stale || fresh {
                return Some(cached.usage);
            }
        }
        Some(self.measure(state, history_bytes))
    }

    /// Measure now, ignoring the debounce.
    pub fn force_memory_update(
        &mut self,
        state: &Value,
        history_bytes: impl FnOnce() -> usize,
    ) -> Option<MemoryUsage> {
        if !self.config.memory_tracking {
            return None;
        }
        Some(self.measure(state, history_bytes))
    }

    fn measure(&mut self, state: &Value, history_bytes: impl FnOnce() -> usize) -> MemoryUsage {
        let state_bytes = estimate_value_size(state);
        let history_bytes = history_bytes();
        let usage = MemoryUsage {
            state_bytes,
            history_bytes,
            total_bytes: state_bytes.saturating_add(history_bytes),
        };
        self.cache = Some(CachedUsage {
            usage,
            measured_at: Instant::now(),
        });
        self.stale = false;
        usage
    }

    pub fn is_memory_cache_stale(&self) -> bool {
        self.stale
    }
}

/// Estimate the in-memory size of `value` in bytes.
pub fn estimate_value_size(value: &Value) -> usize {
    let mut budget = STRUCTURAL_NODE_BUDGET;
    structural_size(value, 0, &mut budget).unwrap_or_else(|| serialized_size(value))
}

fn structural_size(value: &Value, depth: usize, budget: &mut usize) -> Option<usize> {
    if depth > MAX_STRUCTURAL_DEPTH || *budget == 0 {
        return None;
    }
    *budget -= 1;

    let size = match value {
        Value::Null => 0,
        Value::Bool(_) => 4,
        Value::Number(_) => 8,
        Value::String(s) => s.len() * 2,
        Value::Array(items) => {
            let mut total = 0usize;
            for item in items {
                total += structural_size(item, depth + 1, budget)?;
            }
            total
        }
        Value::Object(map) => {
            let mut total = 0usize;
            for (key, item) in map {
                total += key.len() * 2 + structural_size(item, depth + 1, budget)?;
            }
            total
        }
    };
    Some(size)
}

fn serialized_size(value: &Value) -> usize {
    match serde_json::to_string(value) {
        Ok(text) => text.len() * 2,
        Err(e) => {
            tracing::warn!(error = %e, "failed to size state; reporting zero");
            0
        }
    }
}
