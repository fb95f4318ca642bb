//! Diagram Node Data Structures
//!
//! This module defines [`FlowNode`], the positioned, typed vertex of a diagram,
//! together with its geometry types and payload.
//!
//! # Wire Shape
//!
//! Field names serialize in camelCase so that nodes round-trip unchanged through
//! canvas clients (`positionAbsolute`, `parentId`, `zIndex`, ...). Presentation
//! fields this crate does not interpret are preserved in [`FlowNode::extra`].
//!
//! # Payload and Aggregates
//!
//! [`NodeData`] may hold a reference to an aggregate record (`counterId`). The
//! node stores the *reference*, never the value: readers resolve it at read time
//! and receive the joined value in [`NodeData::count`].
//!
//! # Examples
//!
//! ```rust
//! use flowsync_core::models::{FlowNode, XYPosition};
//!
//! let node = FlowNode::new("n1", XYPosition::new(10.0, 20.0));
//! assert_eq!(node.node_type.as_deref(), Some("default"));
//! ```

use crate::models::ids::StorageRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XYPosition {
    pub x: f64,
    pub y: f64,
}

impl XYPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Measured node size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Node payload
///
/// - `aggregate`: server-owned reference to the node's aggregate record. Never
///   exposed in listings and never accepted from change batches.
/// - `count`: aggregate value joined at read time. Never persisted.
/// - `fields`: diagram-schema-specific payload, stored as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "counterId", default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<StorageRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NodeData {
    /// Payload as it may be persisted: the joined value is dropped
    pub fn without_joined_value(mut self) -> Self {
        self.count = None;
        self
    }
}

/// A positioned, typed diagram vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Author-chosen id, unique within a diagram and stable for the node's lifetime
    pub id: String,

    pub position: XYPosition,

    #[serde(default)]
    pub data: NodeData,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dragging: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,

    /// `"parent"` or a `[[x1, y1], [x2, y2]]` coordinate extent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_absolute: Option<XYPosition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resizing: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,

    /// Presentation fields passed through untouched (className, ariaLabel, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowNode {
    /// Create a `default`-typed node with empty payload
    pub fn new(id: impl Into<String>, position: XYPosition) -> Self {
        Self {
            id: id.into(),
            position,
            data: NodeData::default(),
            node_type: Some("default".to_string()),
            selected: None,
            dragging: None,
            width: None,
            height: None,
            hidden: None,
            parent_id: None,
            z_index: None,
            extent: None,
            position_absolute: None,
            resizing: None,
            style: None,
            extra: Map::new(),
        }
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_wire_shape_is_camel_case() {
        let mut node = FlowNode::new("n1", XYPosition::new(1.0, 2.0));
        node.position_absolute = Some(XYPosition::new(1.0, 2.0));
        node.parent_id = Some("group".to_string());

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "default");
        assert_eq!(value["positionAbsolute"]["x"], 1.0);
        assert_eq!(value["parentId"], "group");
        assert!(value.get("selected").is_none(), "unset fields are omitted");
    }

    #[test]
    fn test_unknown_presentation_fields_are_preserved() {
        let value = json!({
            "id": "n1",
            "position": {"x": 0.0, "y": 0.0},
            "data": {"label": "Start", "counterId": 4},
            "className": "accent",
        });

        let node: FlowNode = serde_json::from_value(value).unwrap();
        assert_eq!(node.extra["className"], "accent");
        assert_eq!(node.data.aggregate, Some(StorageRef::from_raw(4)));
        assert_eq!(node.data.fields["label"], "Start");

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["className"], "accent");
        assert_eq!(back["data"]["counterId"], 4);
    }

    #[test]
    fn test_joined_value_is_not_persisted() {
        let data = NodeData {
            count: Some(3),
            ..Default::default()
        };
        assert_eq!(data.without_joined_value().count, None);
    }
}
