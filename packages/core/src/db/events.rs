//! Store Events
//!
//! Events emitted by an [`crate::db::EntityStore`] after each successful write.
//! They follow the observer pattern: subscribers (live queries, session
//! refreshers) receive them over a tokio broadcast channel and re-read the
//! state they care about.
//!
//! # Event Flow
//!
//! 1. A store write commits (insert, patch, delete)
//! 2. The matching event is broadcast, tagged with its diagram
//! 3. Subscribers filter by diagram and collection and refresh their view

use crate::db::entity_store::{AggregateRecord, EdgeRecord, NodeRecord};
use crate::models::{DiagramId, StorageRef};
use serde::Serialize;

/// Record collections held by an entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Nodes,
    Edges,
    Aggregates,
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Collection::Nodes => "node",
            Collection::Edges => "edge",
            Collection::Aggregates => "aggregate",
        })
    }
}

/// Domain-level change notifications
#[derive(Debug, Clone)]
pub enum StoreEvent {
    NodeInserted(NodeRecord),
    NodePatched(NodeRecord),
    NodeDeleted {
        diagram_id: DiagramId,
        storage_ref: StorageRef,
        id: String,
    },
    EdgeInserted(EdgeRecord),
    EdgePatched(EdgeRecord),
    EdgeDeleted {
        diagram_id: DiagramId,
        storage_ref: StorageRef,
        id: String,
    },
    AggregateWritten(AggregateRecord),
}

impl StoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::NodeInserted(_) => "node:inserted",
            StoreEvent::NodePatched(_) => "node:patched",
            StoreEvent::NodeDeleted { .. } => "node:deleted",
            StoreEvent::EdgeInserted(_) => "edge:inserted",
            StoreEvent::EdgePatched(_) => "edge:patched",
            StoreEvent::EdgeDeleted { .. } => "edge:deleted",
            StoreEvent::AggregateWritten(_) => "aggregate:written",
        }
    }

    pub fn diagram_id(&self) -> &DiagramId {
        match self {
            StoreEvent::NodeInserted(record) | StoreEvent::NodePatched(record) => {
                &record.diagram_id
            }
            StoreEvent::EdgeInserted(record) | StoreEvent::EdgePatched(record) => {
                &record.diagram_id
            }
            StoreEvent::AggregateWritten(record) => &record.diagram_id,
            StoreEvent::NodeDeleted { diagram_id, .. } | StoreEvent::EdgeDeleted { diagram_id, .. } => {
                diagram_id
            }
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            StoreEvent::NodeInserted(_) | StoreEvent::NodePatched(_) | StoreEvent::NodeDeleted { .. } => {
                Collection::Nodes
            }
            StoreEvent::EdgeInserted(_) | StoreEvent::EdgePatched(_) | StoreEvent::EdgeDeleted { .. } => {
                Collection::Edges
            }
            StoreEvent::AggregateWritten(_) => Collection::Aggregates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_event_reports_its_diagram() {
        let event = StoreEvent::EdgeDeleted {
            diagram_id: DiagramId::from("d1"),
            storage_ref: StorageRef::from_raw(3),
            id: "e1".to_string(),
        };

        assert_eq!(event.event_type(), "edge:deleted");
        assert_eq!(event.diagram_id().as_str(), "d1");
        assert_eq!(event.collection(), Collection::Edges);
    }
}
