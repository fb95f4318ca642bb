//! EntityStore Trait - Storage Abstraction Layer
//!
//! This module defines the `EntityStore` trait the diagram services persist
//! through. The durable substrate behind it is an external collaborator; the
//! crate ships [`crate::db::MemoryStore`] as its reference implementation.
//!
//! # Contract
//!
//! - **Indexed access only**: lookups go through the by-diagram, by-domain-id
//!   and by-endpoint-pair indices. Nothing in the services scans a whole
//!   collection to find the records it mutates.
//! - **Per-call atomicity**: every method is individually atomic. Multi-step
//!   consistency is the caller's job (see [`crate::services::DiagramLocks`]).
//! - **Domain id uniqueness**: a domain id is unique per diagram within its
//!   collection. Violations fail with [`DatabaseError::UniqueViolation`].
//! - **Storage references** are assigned on insert, immutable and never reused.
//! - **Events**: every successful write broadcasts one [`StoreEvent`].
//!
//! # Examples
//!
//! ```rust
//! use flowsync_core::db::{EntityStore, MemoryStore};
//! use flowsync_core::models::{DiagramId, FlowNode, XYPosition};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let diagram = DiagramId::from("diagram-1");
//! let record = store
//!     .insert_node(&diagram, FlowNode::new("n1", XYPosition::default()))
//!     .await?;
//! assert_eq!(store.node_by_id(&diagram, "n1").await?.unwrap().storage_ref, record.storage_ref);
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use crate::db::events::StoreEvent;
use crate::models::{DiagramId, FlowEdge, FlowNode, StorageRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Persisted node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub storage_ref: StorageRef,
    pub diagram_id: DiagramId,
    pub node: FlowNode,
    /// Starts at 1, bumped on every patch
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Resolved storage references of an edge's endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeEndpoints {
    pub source: StorageRef,
    pub target: StorageRef,
}

/// Persisted edge
///
/// `endpoints` point at the node records that existed when the edge was last
/// written. Nodes are removed without touching their edges, so a reference
/// can go stale until the edge is written again.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub storage_ref: StorageRef,
    pub diagram_id: DiagramId,
    pub endpoints: EdgeEndpoints,
    pub edge: FlowEdge,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Persisted aggregate (a counter owned by one node)
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub storage_ref: StorageRef,
    pub diagram_id: DiagramId,
    pub count: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Indexed collection storage for diagram entities
///
/// Implementations must be `Send + Sync`: one store is shared by every
/// service handle and every concurrent mutation.
#[async_trait]
pub trait EntityStore: Send + Sync {
    //
    // NODES
    //

    /// All nodes of a diagram in insertion order
    async fn nodes_in_diagram(&self, diagram_id: &DiagramId) -> Result<Vec<NodeRecord>, DatabaseError>;

    /// Node by domain id; `Ok(None)` when absent
    async fn node_by_id(
        &self,
        diagram_id: &DiagramId,
        node_id: &str,
    ) -> Result<Option<NodeRecord>, DatabaseError>;

    /// Insert a node, failing if its domain id is taken in the diagram
    async fn insert_node(&self, diagram_id: &DiagramId, node: FlowNode) -> Result<NodeRecord, DatabaseError>;

    /// Replace the stored node value
    async fn patch_node(&self, storage_ref: StorageRef, node: FlowNode) -> Result<NodeRecord, DatabaseError>;

    /// Delete a node; `Ok(false)` when the reference is unknown
    async fn delete_node(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError>;

    //
    // EDGES
    //

    async fn edges_in_diagram(&self, diagram_id: &DiagramId) -> Result<Vec<EdgeRecord>, DatabaseError>;

    async fn edge_by_id(
        &self,
        diagram_id: &DiagramId,
        edge_id: &str,
    ) -> Result<Option<EdgeRecord>, DatabaseError>;

    /// Edges of the diagram running from node `source_id` to node `target_id`
    ///
    /// Keyed on domain ids: an edge whose endpoint node was deleted and then
    /// re-created under the same id is still returned, with stale `endpoints`.
    async fn edges_between(
        &self,
        diagram_id: &DiagramId,
        source_id: &str,
        target_id: &str,
    ) -> Result<Vec<EdgeRecord>, DatabaseError>;

    async fn insert_edge(
        &self,
        diagram_id: &DiagramId,
        endpoints: EdgeEndpoints,
        edge: FlowEdge,
    ) -> Result<EdgeRecord, DatabaseError>;

    async fn patch_edge(
        &self,
        storage_ref: StorageRef,
        endpoints: EdgeEndpoints,
        edge: FlowEdge,
    ) -> Result<EdgeRecord, DatabaseError>;

    async fn delete_edge(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError>;

    //
    // AGGREGATES
    //

    async fn aggregate(&self, storage_ref: StorageRef) -> Result<Option<AggregateRecord>, DatabaseError>;

    async fn aggregates_in_diagram(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<AggregateRecord>, DatabaseError>;

    async fn insert_aggregate(&self, diagram_id: &DiagramId, count: i64) -> Result<AggregateRecord, DatabaseError>;

    async fn patch_aggregate(&self, storage_ref: StorageRef, count: i64) -> Result<AggregateRecord, DatabaseError>;

    async fn delete_aggregate(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError>;

    //
    // LIFECYCLE
    //

    /// Subscribe to write notifications
    fn subscribe_to_events(&self) -> broadcast::Receiver<StoreEvent>;
}
