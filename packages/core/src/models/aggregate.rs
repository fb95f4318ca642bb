//! Denormalized Aggregate Values
//!
//! An aggregate is a secondary record owned by exactly one node and referenced
//! from the node's payload. The only aggregate in this crate is a counter.

use serde::{Deserialize, Serialize};

/// Client-editable payload of a node that is backed by an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientData {
    pub count: i64,
}

/// A write against a node's aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum AggregateWrite {
    /// Replace the value
    Set(i64),
    /// Add to the current value (saturating)
    Add(i64),
}

impl AggregateWrite {
    /// Resulting value given the current one (0 when no aggregate exists yet)
    pub fn apply_to(self, current: i64) -> i64 {
        match self {
            AggregateWrite::Set(value) => value,
            AggregateWrite::Add(delta) => current.saturating_add(delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_write_semantics() {
        assert_eq!(AggregateWrite::Set(5).apply_to(2), 5);
        assert_eq!(AggregateWrite::Add(3).apply_to(2), 5);
        assert_eq!(AggregateWrite::Add(1).apply_to(i64::MAX), i64::MAX);
    }
}
