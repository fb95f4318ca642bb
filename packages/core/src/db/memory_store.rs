//! MemoryStore - EntityStore Implementation Held in Process Memory
//!
//! Reference implementation of [`EntityStore`] used by the demo binary, the
//! test suites and benchmarks.
//!
//! # Layout
//!
//! One `tokio::sync::RwLock` guards all tables, so every trait call is atomic.
//! Each collection keeps its primary map plus the indices the services query:
//!
//! - `(diagram, domain id) → storage ref` (unique)
//! - `diagram → storage refs` (ordered, refs grow monotonically)
//! - `(diagram, source id, target id) → edge refs` for edges, keyed on the
//!   domain ids so an edge still matches after its endpoint node is re-created

use crate::db::entity_store::{AggregateRecord, EdgeEndpoints, EdgeRecord, EntityStore, NodeRecord};
use crate::db::error::DatabaseError;
use crate::db::events::StoreEvent;
use crate::models::{DiagramId, FlowEdge, FlowNode, StorageRef};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Broadcast channel capacity for store events.
///
/// Subscribers that lag further behind than this lose the oldest events and
/// are expected to re-read current state.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

const NODE_ID_INDEX: &str = "nodes.id";
const EDGE_ID_INDEX: &str = "edges.id";

type DomainKey = (DiagramId, String);
type EndpointKey = (DiagramId, String, String);

fn endpoint_key(diagram_id: &DiagramId, edge: &FlowEdge) -> EndpointKey {
    (diagram_id.clone(), edge.source.clone(), edge.target.clone())
}

#[derive(Default)]
struct Tables {
    nodes: BTreeMap<StorageRef, NodeRecord>,
    node_ids: HashMap<DomainKey, StorageRef>,
    nodes_by_diagram: HashMap<DiagramId, BTreeSet<StorageRef>>,

    edges: BTreeMap<StorageRef, EdgeRecord>,
    edge_ids: HashMap<DomainKey, StorageRef>,
    edges_by_diagram: HashMap<DiagramId, BTreeSet<StorageRef>>,
    edges_by_endpoints: HashMap<EndpointKey, BTreeSet<StorageRef>>,

    aggregates: BTreeMap<StorageRef, AggregateRecord>,
    aggregates_by_diagram: HashMap<DiagramId, BTreeSet<StorageRef>>,
}

impl Tables {
    fn collect<'a, R: Clone + 'a>(
        refs: Option<&BTreeSet<StorageRef>>,
        records: &'a BTreeMap<StorageRef, R>,
    ) -> Vec<R> {
        refs.into_iter()
            .flatten()
            .filter_map(|storage_ref| records.get(storage_ref).cloned())
            .collect()
    }
}

/// In-memory entity store
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_ref: AtomicU64,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tables: RwLock::new(Tables::default()),
            next_ref: AtomicU64::new(1),
            event_tx,
        }
    }

    fn allocate_ref(&self) -> StorageRef {
        StorageRef::from_raw(self.next_ref.fetch_add(1, Ordering::Relaxed))
    }

    fn emit(&self, event: StoreEvent) {
        tracing::trace!("store event {} in {}", event.event_type(), event.diagram_id());
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn nodes_in_diagram(&self, diagram_id: &DiagramId) -> Result<Vec<NodeRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(Tables::collect(tables.nodes_by_diagram.get(diagram_id), &tables.nodes))
    }

    async fn node_by_id(
        &self,
        diagram_id: &DiagramId,
        node_id: &str,
    ) -> Result<Option<NodeRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        let key = (diagram_id.clone(), node_id.to_string());
        Ok(tables
            .node_ids
            .get(&key)
            .and_then(|storage_ref| tables.nodes.get(storage_ref))
            .cloned())
    }

    async fn insert_node(&self, diagram_id: &DiagramId, node: FlowNode) -> Result<NodeRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let key = (diagram_id.clone(), node.id.clone());
            if tables.node_ids.contains_key(&key) {
                return Err(DatabaseError::unique_violation(NODE_ID_INDEX, node.id));
            }

            let now = Utc::now();
            let record = NodeRecord {
                storage_ref: self.allocate_ref(),
                diagram_id: diagram_id.clone(),
                node,
                version: 1,
                created_at: now,
                modified_at: now,
            };
            tables.node_ids.insert(key, record.storage_ref);
            tables
                .nodes_by_diagram
                .entry(diagram_id.clone())
                .or_default()
                .insert(record.storage_ref);
            tables.nodes.insert(record.storage_ref, record.clone());
            record
        };

        self.emit(StoreEvent::NodeInserted(record.clone()));
        Ok(record)
    }

    async fn patch_node(&self, storage_ref: StorageRef, node: FlowNode) -> Result<NodeRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let (diagram_id, old_id) = match tables.nodes.get(&storage_ref) {
                Some(existing) => (existing.diagram_id.clone(), existing.node.id.clone()),
                None => return Err(DatabaseError::record_not_found(storage_ref)),
            };

            if old_id != node.id {
                let new_key = (diagram_id.clone(), node.id.clone());
                if tables.node_ids.contains_key(&new_key) {
                    return Err(DatabaseError::unique_violation(NODE_ID_INDEX, node.id));
                }
                tables.node_ids.remove(&(diagram_id, old_id));
                tables.node_ids.insert(new_key, storage_ref);
            }

            let record = tables
                .nodes
                .get_mut(&storage_ref)
                .ok_or_else(|| DatabaseError::record_not_found(storage_ref))?;
            record.node = node;
            record.version += 1;
            record.modified_at = Utc::now();
            record.clone()
        };

        self.emit(StoreEvent::NodePatched(record.clone()));
        Ok(record)
    }

    async fn delete_node(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError> {
        let removed = {
            let mut tables = self.tables.write().await;
            let Some(record) = tables.nodes.remove(&storage_ref) else {
                return Ok(false);
            };
            tables
                .node_ids
                .remove(&(record.diagram_id.clone(), record.node.id.clone()));
            if let Some(refs) = tables.nodes_by_diagram.get_mut(&record.diagram_id) {
                refs.remove(&storage_ref);
            }
            record
        };

        self.emit(StoreEvent::NodeDeleted {
            diagram_id: removed.diagram_id,
            storage_ref,
            id: removed.node.id,
        });
        Ok(true)
    }

    async fn edges_in_diagram(&self, diagram_id: &DiagramId) -> Result<Vec<EdgeRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(Tables::collect(tables.edges_by_diagram.get(diagram_id), &tables.edges))
    }

    async fn edge_by_id(
        &self,
        diagram_id: &DiagramId,
        edge_id: &str,
    ) -> Result<Option<EdgeRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        let key = (diagram_id.clone(), edge_id.to_string());
        Ok(tables
            .edge_ids
            .get(&key)
            .and_then(|storage_ref| tables.edges.get(storage_ref))
            .cloned())
    }

    async fn edges_between(
        &self,
        diagram_id: &DiagramId,
        source_id: &str,
        target_id: &str,
    ) -> Result<Vec<EdgeRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        let key = (diagram_id.clone(), source_id.to_string(), target_id.to_string());
        Ok(Tables::collect(tables.edges_by_endpoints.get(&key), &tables.edges))
    }

    async fn insert_edge(
        &self,
        diagram_id: &DiagramId,
        endpoints: EdgeEndpoints,
        edge: FlowEdge,
    ) -> Result<EdgeRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let key = (diagram_id.clone(), edge.id.clone());
            if tables.edge_ids.contains_key(&key) {
                return Err(DatabaseError::unique_violation(EDGE_ID_INDEX, edge.id));
            }

            let endpoint_key = endpoint_key(diagram_id, &edge);
            let now = Utc::now();
            let record = EdgeRecord {
                storage_ref: self.allocate_ref(),
                diagram_id: diagram_id.clone(),
                endpoints,
                edge,
                version: 1,
                created_at: now,
                modified_at: now,
            };
            tables.edge_ids.insert(key, record.storage_ref);
            tables
                .edges_by_diagram
                .entry(diagram_id.clone())
                .or_default()
                .insert(record.storage_ref);
            tables
                .edges_by_endpoints
                .entry(endpoint_key)
                .or_default()
                .insert(record.storage_ref);
            tables.edges.insert(record.storage_ref, record.clone());
            record
        };

        self.emit(StoreEvent::EdgeInserted(record.clone()));
        Ok(record)
    }

    async fn patch_edge(
        &self,
        storage_ref: StorageRef,
        endpoints: EdgeEndpoints,
        edge: FlowEdge,
    ) -> Result<EdgeRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let (diagram_id, old_id, old_key) = match tables.edges.get(&storage_ref) {
                Some(existing) => (
                    existing.diagram_id.clone(),
                    existing.edge.id.clone(),
                    endpoint_key(&existing.diagram_id, &existing.edge),
                ),
                None => return Err(DatabaseError::record_not_found(storage_ref)),
            };

            let new_key = endpoint_key(&diagram_id, &edge);
            if old_id != edge.id {
                let new_id = (diagram_id.clone(), edge.id.clone());
                if tables.edge_ids.contains_key(&new_id) {
                    return Err(DatabaseError::unique_violation(EDGE_ID_INDEX, edge.id));
                }
                tables.edge_ids.remove(&(diagram_id, old_id));
                tables.edge_ids.insert(new_id, storage_ref);
            }

            if old_key != new_key {
                if let Some(refs) = tables.edges_by_endpoints.get_mut(&old_key) {
                    refs.remove(&storage_ref);
                }
                tables
                    .edges_by_endpoints
                    .entry(new_key)
                    .or_default()
                    .insert(storage_ref);
            }

            let record = tables
                .edges
                .get_mut(&storage_ref)
                .ok_or_else(|| DatabaseError::record_not_found(storage_ref))?;
            record.endpoints = endpoints;
            record.edge = edge;
            record.version += 1;
            record.modified_at = Utc::now();
            record.clone()
        };

        self.emit(StoreEvent::EdgePatched(record.clone()));
        Ok(record)
    }

    async fn delete_edge(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError> {
        let removed = {
            let mut tables = self.tables.write().await;
            let Some(record) = tables.edges.remove(&storage_ref) else {
                return Ok(false);
            };
            tables
                .edge_ids
                .remove(&(record.diagram_id.clone(), record.edge.id.clone()));
            if let Some(refs) = tables.edges_by_diagram.get_mut(&record.diagram_id) {
                refs.remove(&storage_ref);
            }
            if let Some(refs) = tables
                .edges_by_endpoints
                .get_mut(&endpoint_key(&record.diagram_id, &record.edge))
            {
                refs.remove(&storage_ref);
            }
            record
        };

        self.emit(StoreEvent::EdgeDeleted {
            diagram_id: removed.diagram_id,
            storage_ref,
            id: removed.edge.id,
        });
        Ok(true)
    }

    async fn aggregate(&self, storage_ref: StorageRef) -> Result<Option<AggregateRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.aggregates.get(&storage_ref).cloned())
    }

    async fn aggregates_in_diagram(
        &self,
        diagram_id: &DiagramId,
    ) -> Result<Vec<AggregateRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(Tables::collect(
            tables.aggregates_by_diagram.get(diagram_id),
            &tables.aggregates,
        ))
    }

    async fn insert_aggregate(&self, diagram_id: &DiagramId, count: i64) -> Result<AggregateRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let now = Utc::now();
            let record = AggregateRecord {
                storage_ref: self.allocate_ref(),
                diagram_id: diagram_id.clone(),
                count,
                version: 1,
                created_at: now,
                modified_at: now,
            };
            tables
                .aggregates_by_diagram
                .entry(diagram_id.clone())
                .or_default()
                .insert(record.storage_ref);
            tables.aggregates.insert(record.storage_ref, record.clone());
            record
        };

        self.emit(StoreEvent::AggregateWritten(record.clone()));
        Ok(record)
    }

    async fn patch_aggregate(&self, storage_ref: StorageRef, count: i64) -> Result<AggregateRecord, DatabaseError> {
        let record = {
            let mut tables = self.tables.write().await;
            let record = tables
                .aggregates
                .get_mut(&storage_ref)
                .ok_or_else(|| DatabaseError::record_not_found(storage_ref))?;
            record.count = count;
            record.version += 1;
            record.modified_at = Utc::now();
            record.clone()
        };

        self.emit(StoreEvent::AggregateWritten(record.clone()));
        Ok(record)
    }

    async fn delete_aggregate(&self, storage_ref: StorageRef) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.aggregates.remove(&storage_ref) else {
            return Ok(false);
        };
        if let Some(refs) = tables.aggregates_by_diagram.get_mut(&record.diagram_id) {
            refs.remove(&storage_ref);
        }
        Ok(true)
    }

    fn subscribe_to_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::XYPosition;
    use tokio::time::{timeout, Duration};

    fn diagram() -> DiagramId {
        DiagramId::from("diagram-test")
    }

    fn node(id: &str) -> FlowNode {
        FlowNode::new(id, XYPosition::default())
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_refs() {
        let store = MemoryStore::new();
        let a = store.insert_node(&diagram(), node("a")).await.unwrap();
        let b = store.insert_node(&diagram(), node("b")).await.unwrap();

        assert_ne!(a.storage_ref, b.storage_ref);
        assert_eq!(a.version, 1);
    }

    #[tokio::test]
    async fn test_duplicate_node_id_is_rejected_per_diagram() {
        let store = MemoryStore::new();
        store.insert_node(&diagram(), node("a")).await.unwrap();

        let err = store.insert_node(&diagram(), node("a")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation { .. }));

        // Same id in another diagram is fine
        store
            .insert_node(&DiagramId::from("other"), node("a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lookup_is_scoped_to_diagram() {
        let store = MemoryStore::new();
        store.insert_node(&diagram(), node("a")).await.unwrap();

        assert!(store.node_by_id(&diagram(), "a").await.unwrap().is_some());
        assert!(store
            .node_by_id(&DiagramId::from("other"), "a")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_patch_bumps_version_and_keeps_ref() {
        let store = MemoryStore::new();
        let inserted = store.insert_node(&diagram(), node("a")).await.unwrap();

        let mut moved = node("a");
        moved.position = XYPosition::new(5.0, 5.0);
        let patched = store.patch_node(inserted.storage_ref, moved).await.unwrap();

        assert_eq!(patched.storage_ref, inserted.storage_ref);
        assert_eq!(patched.version, 2);
        assert_eq!(patched.node.position, XYPosition::new(5.0, 5.0));
    }

    #[tokio::test]
    async fn test_patch_unknown_ref_fails() {
        let store = MemoryStore::new();
        let err = store
            .patch_node(StorageRef::from_raw(99), node("a"))
            .await
            .unwrap_err();
        assert_eq!(err, DatabaseError::record_not_found(StorageRef::from_raw(99)));
    }

    #[tokio::test]
    async fn test_delete_frees_domain_id_but_not_ref() {
        let store = MemoryStore::new();
        let first = store.insert_node(&diagram(), node("a")).await.unwrap();
        assert!(store.delete_node(first.storage_ref).await.unwrap());
        assert!(!store.delete_node(first.storage_ref).await.unwrap());

        let second = store.insert_node(&diagram(), node("a")).await.unwrap();
        assert!(second.storage_ref > first.storage_ref, "refs are never reused");
    }

    #[tokio::test]
    async fn test_edges_between_follows_patched_endpoints() {
        let store = MemoryStore::new();
        let a = store.insert_node(&diagram(), node("a")).await.unwrap();
        let b = store.insert_node(&diagram(), node("b")).await.unwrap();
        let c = store.insert_node(&diagram(), node("c")).await.unwrap();

        let ab = EdgeEndpoints {
            source: a.storage_ref,
            target: b.storage_ref,
        };
        let ac = EdgeEndpoints {
            source: a.storage_ref,
            target: c.storage_ref,
        };
        let edge = store
            .insert_edge(&diagram(), ab, FlowEdge::new("e1", "a", "b"))
            .await
            .unwrap();
        assert_eq!(store.edges_between(&diagram(), "a", "b").await.unwrap().len(), 1);

        store
            .patch_edge(edge.storage_ref, ac, FlowEdge::new("e1", "a", "c"))
            .await
            .unwrap();
        assert!(store.edges_between(&diagram(), "a", "b").await.unwrap().is_empty());
        assert_eq!(store.edges_between(&diagram(), "a", "c").await.unwrap().len(), 1);
        assert!(store
            .edges_between(&DiagramId::from("other"), "a", "c")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_edges_between_survives_endpoint_recreation() {
        let store = MemoryStore::new();
        let a = store.insert_node(&diagram(), node("a")).await.unwrap();
        let b = store.insert_node(&diagram(), node("b")).await.unwrap();
        let endpoints = EdgeEndpoints {
            source: a.storage_ref,
            target: b.storage_ref,
        };
        store
            .insert_edge(&diagram(), endpoints, FlowEdge::new("e1", "a", "b"))
            .await
            .unwrap();

        store.delete_node(b.storage_ref).await.unwrap();
        store.insert_node(&diagram(), node("b")).await.unwrap();

        let found = store.edges_between(&diagram(), "a", "b").await.unwrap();
        assert_eq!(found.len(), 1);
        // Still the deleted record's ref
        assert_eq!(found[0].endpoints.target, b.storage_ref);
    }

    #[tokio::test]
    async fn test_delete_edge_clears_endpoint_index() {
        let store = MemoryStore::new();
        let a = store.insert_node(&diagram(), node("a")).await.unwrap();
        let b = store.insert_node(&diagram(), node("b")).await.unwrap();
        let endpoints = EdgeEndpoints {
            source: a.storage_ref,
            target: b.storage_ref,
        };
        let edge = store
            .insert_edge(&diagram(), endpoints, FlowEdge::new("e1", "a", "b"))
            .await
            .unwrap();

        assert!(store.delete_edge(edge.storage_ref).await.unwrap());
        assert!(store.edges_between(&diagram(), "a", "b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aggregates_are_listed_per_diagram() {
        let store = MemoryStore::new();
        let counter = store.insert_aggregate(&diagram(), 2).await.unwrap();
        store.patch_aggregate(counter.storage_ref, 3).await.unwrap();

        let listed = store.aggregates_in_diagram(&diagram()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].count, 3);
        assert_eq!(listed[0].version, 2);
    }

    #[tokio::test]
    async fn test_writes_emit_events() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe_to_events();

        store.insert_node(&diagram(), node("a")).await.unwrap();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event should be emitted within 1 second")
            .expect("Should receive event");
        match event {
            StoreEvent::NodeInserted(record) => assert_eq!(record.node.id, "a"),
            other => panic!("Expected NodeInserted event, got {:?}", other),
        }
    }
}
