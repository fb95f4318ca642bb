//! Incremental Change Operations
//!
//! A change batch is an ordered `Vec` of these operations, produced by the
//! canvas for every gesture (drag, resize, select, delete, connect). The JSON
//! shape is internally tagged by `"type"`:
//!
//! ```json
//! {"type": "position", "id": "n1", "position": {"x": 10, "y": 20}, "dragging": true}
//! ```
//!
//! The variant set is closed. Edges only support membership and selection
//! changes; nodes additionally support position and dimension updates, and a
//! count update that predicts an aggregate write on the client.

use crate::models::aggregate::AggregateWrite;
use crate::models::edge::FlowEdge;
use crate::models::node::{Dimensions, FlowNode, XYPosition};
use serde::{Deserialize, Serialize};

/// A single change against a diagram's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeChange {
    /// Append `item`
    Add { item: FlowNode },

    /// Replace the node with `item.id` entirely, or append it if absent
    Reset { item: FlowNode },

    /// Drop the node; unknown ids are ignored
    Remove { id: String },

    Select { id: String, selected: bool },

    Position {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<XYPosition>,
        #[serde(
            rename = "positionAbsolute",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        position_absolute: Option<XYPosition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dragging: Option<bool>,
    },

    Dimensions {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimensions: Option<Dimensions>,
        #[serde(rename = "updateStyle", default, skip_serializing_if = "Option::is_none")]
        update_style: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resizing: Option<bool>,
    },

    /// Predicted aggregate write against the joined `data.count`
    ///
    /// Joined counts are never persisted, so the server treats this as a no-op;
    /// aggregates change through `write_node_aggregate` only.
    Count { id: String, write: AggregateWrite },
}

impl NodeChange {
    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    pub fn select(id: impl Into<String>, selected: bool) -> Self {
        Self::Select {
            id: id.into(),
            selected,
        }
    }

    /// Position update as emitted at the end of a drag
    pub fn moved(id: impl Into<String>, position: XYPosition) -> Self {
        Self::Position {
            id: id.into(),
            position: Some(position),
            position_absolute: None,
            dragging: Some(false),
        }
    }

    pub fn resized(id: impl Into<String>, dimensions: Dimensions) -> Self {
        Self::Dimensions {
            id: id.into(),
            dimensions: Some(dimensions),
            update_style: None,
            resizing: None,
        }
    }

    pub fn count(id: impl Into<String>, write: AggregateWrite) -> Self {
        Self::Count { id: id.into(), write }
    }
}

/// A single change against a diagram's edge list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EdgeChange {
    Add { item: FlowEdge },
    Reset { item: FlowEdge },
    Remove { id: String },
    Select { id: String, selected: bool },
}

impl EdgeChange {
    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    pub fn select(id: impl Into<String>, selected: bool) -> Self {
        Self::Select {
            id: id.into(),
            selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_change_wire_format() {
        let change: NodeChange = serde_json::from_value(json!({
            "type": "position",
            "id": "n1",
            "position": {"x": 5.0, "y": 6.0},
            "positionAbsolute": {"x": 15.0, "y": 16.0},
            "dragging": true,
        }))
        .unwrap();

        match change {
            NodeChange::Position {
                id,
                position,
                position_absolute,
                dragging,
            } => {
                assert_eq!(id, "n1");
                assert_eq!(position, Some(XYPosition::new(5.0, 6.0)));
                assert_eq!(position_absolute, Some(XYPosition::new(15.0, 16.0)));
                assert_eq!(dragging, Some(true));
            }
            other => panic!("Expected Position change, got {:?}", other),
        }
    }

    #[test]
    fn test_dimension_change_accepts_missing_optionals() {
        let change: NodeChange = serde_json::from_value(json!({
            "type": "dimensions",
            "id": "n1",
            "updateStyle": true,
        }))
        .unwrap();

        assert_eq!(
            change,
            NodeChange::Dimensions {
                id: "n1".to_string(),
                dimensions: None,
                update_style: Some(true),
                resizing: None,
            }
        );
    }

    #[test]
    fn test_edge_change_rejects_position_variant() {
        let result = serde_json::from_value::<EdgeChange>(json!({
            "type": "position",
            "id": "e1",
        }));
        assert!(result.is_err(), "edges carry no position changes");
    }
}
