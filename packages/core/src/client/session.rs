//! Diagram Session
//!
//! Client-side handle on one diagram: the session's [`SessionConfig`], the
//! authoritative service, and optimistic views of the node and edge lists.
//!
//! # Staging and Committing
//!
//! Local edits are *staged* first, which makes their prediction visible in
//! [`DiagramSession::nodes`] / [`DiagramSession::edges`] immediately. Committing
//! sends the edit to the service:
//!
//! - on success the staged prediction is dropped and the view re-bases on the
//!   freshly listed authoritative state
//! - on failure the prediction is rolled back and the base is refreshed, since
//!   a partially rejected batch may still have written some entities
//!
//! # Examples
//!
//! ```rust
//! use flowsync_core::client::DiagramSession;
//! use flowsync_core::config::SessionConfig;
//! use flowsync_core::db::MemoryStore;
//! use flowsync_core::models::{FlowNode, NodeChange, XYPosition};
//! use flowsync_core::services::DiagramService;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(DiagramService::new(Arc::new(MemoryStore::new())));
//! let mut session = DiagramSession::load(SessionConfig::new("diagram-1")?, service).await?;
//!
//! let pending = session.stage_node_changes(vec![NodeChange::Add {
//!     item: FlowNode::new("n1", XYPosition::new(0.0, 0.0)),
//! }]);
//! assert_eq!(session.nodes().len(), 1); // predicted
//!
//! session.commit_node_changes(pending).await?;
//! assert_eq!(session.nodes().len(), 1); // authoritative
//! # Ok(())
//! # }
//! ```

use crate::client::prediction::{OptimisticView, PendingId};
use crate::config::SessionConfig;
use crate::models::{AggregateWrite, Connection, DiagramId, EdgeChange, FlowEdge, FlowNode, IdGenerator, NodeChange, UuidIdGenerator};
use crate::services::{BatchOutcome, ConnectOutcome, CreateNodeParams, CreatedNode, DiagramService, DiagramServiceError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Session errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The handle was never staged here, or was already committed
    #[error("No staged mutation {0}")]
    UnknownPending(PendingId),

    #[error(transparent)]
    Service(#[from] DiagramServiceError),
}

/// Optimistic client session on one diagram
pub struct DiagramSession {
    config: SessionConfig,
    service: Arc<DiagramService>,
    nodes: OptimisticView<NodeChange>,
    edges: OptimisticView<EdgeChange>,
    staged_connections: HashMap<PendingId, Connection>,
    staged_aggregates: HashMap<PendingId, (String, AggregateWrite)>,
    provisional_ids: UuidIdGenerator,
}

impl DiagramSession {
    /// Open the configured diagram and load its current state
    pub async fn load(config: SessionConfig, service: Arc<DiagramService>) -> Result<Self, SessionError> {
        let (nodes, edges) = tokio::try_join!(
            service.list_nodes(&config.diagram_id),
            service.list_edges(&config.diagram_id)
        )?;
        tracing::debug!(
            "Session loaded {} with {} nodes and {} edges",
            config.diagram_id,
            nodes.len(),
            edges.len()
        );

        Ok(Self {
            config,
            service,
            nodes: OptimisticView::new(nodes),
            edges: OptimisticView::new(edges),
            staged_connections: HashMap::new(),
            staged_aggregates: HashMap::new(),
            provisional_ids: UuidIdGenerator,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn diagram_id(&self) -> &DiagramId {
        &self.config.diagram_id
    }

    /// Predicted nodes
    pub fn nodes(&self) -> Vec<FlowNode> {
        self.nodes.view()
    }

    /// Predicted edges
    pub fn edges(&self) -> Vec<FlowEdge> {
        self.edges.view()
    }

    pub fn has_pending(&self) -> bool {
        self.nodes.pending_count() + self.edges.pending_count() > 0
    }

    /// Re-read both authoritative lists; pending predictions stay on top
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let (nodes, edges) = tokio::try_join!(
            self.service.list_nodes(&self.config.diagram_id),
            self.service.list_edges(&self.config.diagram_id)
        )?;
        self.nodes.replace_base(nodes);
        self.edges.replace_base(edges);
        Ok(())
    }

    // NODE CHANGES

    pub fn stage_node_changes(&mut self, changes: Vec<NodeChange>) -> PendingId {
        self.nodes.submit(changes)
    }

    pub async fn commit_node_changes(&mut self, id: PendingId) -> Result<BatchOutcome, SessionError> {
        let changes = self
            .nodes
            .pending(id)
            .filter(|_| !self.staged_aggregates.contains_key(&id))
            .ok_or(SessionError::UnknownPending(id))?
            .to_vec();

        let result = self
            .service
            .apply_node_changes(&self.config.diagram_id, changes)
            .await
            .and_then(BatchOutcome::into_result);
        let resolved = self.resolve_nodes(id, result.is_ok()).await;
        let outcome = result?;
        resolved?;
        Ok(outcome)
    }

    // EDGE CHANGES

    pub fn stage_edge_changes(&mut self, changes: Vec<EdgeChange>) -> PendingId {
        self.edges.submit(changes)
    }

    pub async fn commit_edge_changes(&mut self, id: PendingId) -> Result<BatchOutcome, SessionError> {
        let changes = self
            .edges
            .pending(id)
            .filter(|_| !self.staged_connections.contains_key(&id))
            .ok_or(SessionError::UnknownPending(id))?
            .to_vec();

        let result = self
            .service
            .apply_edge_changes(&self.config.diagram_id, changes)
            .await
            .and_then(BatchOutcome::into_result);
        let resolved = self.resolve_edges(id, result.is_ok()).await;
        let outcome = result?;
        resolved?;
        Ok(outcome)
    }

    // CONNECT

    /// Stage a connect gesture; a provisional edge shows until committed
    pub fn stage_connection(&mut self, connection: Connection) -> PendingId {
        let nodes = self.nodes.view();
        let node_ids: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        let provisional_id = format!("provisional-{}", self.provisional_ids.next_id());

        let id = self
            .edges
            .submit_connection(&connection, Some(node_ids.as_slice()), provisional_id);
        self.staged_connections.insert(id, connection);
        id
    }

    pub async fn commit_connection(&mut self, id: PendingId) -> Result<ConnectOutcome, SessionError> {
        let connection = self
            .staged_connections
            .remove(&id)
            .ok_or(SessionError::UnknownPending(id))?;

        let result = self.service.connect(&self.config.diagram_id, connection).await;
        let resolved = self.resolve_edges(id, result.is_ok()).await;
        let outcome = result?;
        resolved?;
        Ok(outcome)
    }

    // AGGREGATES

    /// Stage an aggregate write; the node's predicted count updates at once
    pub fn stage_aggregate(&mut self, node_id: impl Into<String>, write: AggregateWrite) -> PendingId {
        let node_id = node_id.into();
        let id = self.nodes.submit_aggregate(&node_id, write);
        self.staged_aggregates.insert(id, (node_id, write));
        id
    }

    pub async fn commit_aggregate(&mut self, id: PendingId) -> Result<i64, SessionError> {
        let (node_id, write) = self
            .staged_aggregates
            .remove(&id)
            .ok_or(SessionError::UnknownPending(id))?;

        let result = self
            .service
            .write_node_aggregate(&self.config.diagram_id, &node_id, write)
            .await;
        let resolved = self.resolve_nodes(id, result.is_ok()).await;
        let value = result?;
        resolved?;
        Ok(value)
    }

    /// Create a node (and its auto-connect edge) without prediction
    pub async fn create_node(&mut self, params: CreateNodeParams) -> Result<CreatedNode, SessionError> {
        let created = self.service.create_node(&self.config.diagram_id, params).await?;
        self.refresh().await?;
        Ok(created)
    }

    async fn resolve_nodes(&mut self, id: PendingId, committed: bool) -> Result<(), SessionError> {
        if !committed {
            tracing::debug!("Rolling back node prediction {}", id);
            self.nodes.reject(id);
        }
        let authoritative = self.service.list_nodes(&self.config.diagram_id).await?;
        if committed {
            self.nodes.settle(id, authoritative);
        } else {
            self.nodes.replace_base(authoritative);
        }
        Ok(())
    }

    async fn resolve_edges(&mut self, id: PendingId, committed: bool) -> Result<(), SessionError> {
        if !committed {
            tracing::debug!("Rolling back edge prediction {}", id);
            self.edges.reject(id);
        }
        let authoritative = self.service.list_edges(&self.config.diagram_id).await?;
        if committed {
            self.edges.settle(id, authoritative);
        } else {
            self.edges.replace_base(authoritative);
        }
        Ok(())
    }
}
