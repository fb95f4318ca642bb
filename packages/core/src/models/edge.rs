//! Diagram Edge Data Structures
//!
//! [`FlowEdge`] is a typed, directed connection between two nodes, optionally
//! bound to named connection handles. [`Connection`] is the proposal produced
//! by a drag-to-connect gesture before it becomes an edge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A directed connection between two nodes of the same diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,

    /// Domain id of the source node
    pub source: String,

    /// Domain id of the target node
    pub target: String,

    #[serde(default)]
    pub source_handle: Option<String>,

    #[serde(default)]
    pub target_handle: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            edge_type: None,
            data: None,
            selected: None,
            hidden: None,
            animated: None,
            label: None,
            z_index: None,
            extra: Map::new(),
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }

    /// Whether this edge joins the same endpoints and handles as `connection`
    ///
    /// A missing handle and an explicit `null` handle compare equal.
    pub fn matches_connection(&self, connection: &Connection) -> bool {
        connection.source.as_deref() == Some(self.source.as_str())
            && connection.target.as_deref() == Some(self.target.as_str())
            && connection.source_handle == self.source_handle
            && connection.target_handle == self.target_handle
    }

    /// Whether both edges join the same `(source, target, sourceHandle, targetHandle)`
    pub fn same_connection(&self, other: &FlowEdge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}

/// Proposed connection between two nodes
///
/// Every field is nullable: a gesture may end without a valid endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }

    /// Both endpoints, if the proposal names them
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match (self.source.as_deref(), self.target.as_deref()) {
            (Some(source), Some(target)) => Some((source, target)),
            _ => None,
        }
    }
}
