//! core::types
//!
//! Strong identifier types shared by the store components.
//!
//! # Types
//!
//! - [`SubscriptionId`] - Registry-unique subscription identifier
//! - [`OperationId`] - Identifier of an in-flight async mutation
//!
//! # Examples
//!
//! ```
//! use arcade_state::core::types::{OperationId, SubscriptionId};
//!
//! let a = OperationId::new();
//! let b = OperationId::new();
//! assert_ne!(a, b);
//!
//! let id = SubscriptionId::from_raw(7);
//! assert_eq!(id.to_string(), "sub_7");
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a subscription by the registry that owns it.
///
/// Ids are allocated sequentially per registry and are never reused, so a
/// stale id can never address a newer subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw counter value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Unique identifier for an async operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a new unique operation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an OperationId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| OperationId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn operation_id_serde_is_transparent_string() {
        let id = OperationId::from_string("op-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"op-1\"");
        let parsed: OperationId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn subscription_id_display() {
        assert_eq!(SubscriptionId::from_raw(42).to_string(), "sub_42");
        assert_eq!(SubscriptionId::from_raw(42).as_u64(), 42);
    }
}
