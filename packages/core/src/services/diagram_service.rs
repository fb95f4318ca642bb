//! Diagram Service - Authoritative Graph Mutations
//!
//! [`DiagramService`] is the single writer of diagram state. It owns the
//! handles every entry point needs and is split by concern across modules:
//!
//! - `node_service` - node change batches, node creation, node listings
//! - `edge_service` - edge change batches, idempotent connect, edge listings
//! - `aggregate_service` - lazily created per-node aggregates
//!
//! # Batch Pipeline
//!
//! Both change-batch entry points run the same steps:
//!
//! 1. Check write access (denial has no side effects)
//! 2. Take the diagram's lock from [`DiagramLocks`]
//! 3. Collect the distinct domain ids the batch references
//! 4. Fetch only those records, concurrently, through the by-id index
//! 5. Run the shared change applicator over the fetched subset
//! 6. Reconcile fetched vs applied into inserts, patches and deletes
//! 7. Issue the writes concurrently; each write is individually atomic
//!
//! Per-entity failures are collected in the returned [`BatchOutcome`].
//!
//! # Examples
//!
//! ```rust
//! use flowsync_core::db::MemoryStore;
//! use flowsync_core::models::{DiagramId, FlowNode, NodeChange, XYPosition};
//! use flowsync_core::services::DiagramService;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = DiagramService::new(Arc::new(MemoryStore::new()));
//! let diagram = DiagramId::from("diagram-1");
//!
//! let batch = vec![NodeChange::Reset {
//!     item: FlowNode::new("n1", XYPosition::new(0.0, 0.0)),
//! }];
//! let outcome = service.apply_node_changes(&diagram, batch).await?;
//! assert_eq!(outcome.inserted, vec!["n1".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! [`BatchOutcome`]: crate::services::BatchOutcome

use crate::db::{EntityStore, StoreEvent};
use crate::models::{DiagramId, IdGenerator, UuidIdGenerator};
use crate::services::access::{AccessKind, AccessPolicy, AllowAll};
use crate::services::diagram_locks::DiagramLocks;
use crate::services::error::DiagramServiceError;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Authoritative mutation and read service for diagrams
pub struct DiagramService {
    pub(crate) store: Arc<dyn EntityStore>,
    access: Arc<dyn AccessPolicy>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) locks: DiagramLocks,
}

impl DiagramService {
    /// Service over `store` that allows every call and generates uuid v4 ids
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            access: Arc::new(AllowAll),
            ids: Arc::new(UuidIdGenerator),
            locks: DiagramLocks::new(),
        }
    }

    pub fn with_access_policy(mut self, access: Arc<dyn AccessPolicy>) -> Self {
        self.access = access;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Subscribe to the underlying store's write events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe_to_events()
    }

    pub(crate) async fn authorize(
        &self,
        diagram_id: &DiagramId,
        access: AccessKind,
    ) -> Result<(), DiagramServiceError> {
        if self.access.allows(diagram_id, access).await {
            Ok(())
        } else {
            tracing::warn!("{} access denied for diagram {}", access, diagram_id);
            Err(DiagramServiceError::unauthorized(diagram_id, access))
        }
    }
}
