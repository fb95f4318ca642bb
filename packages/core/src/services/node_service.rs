//! Node Entry Points
//!
//! Node change batches, node creation with optional auto-connect, and the
//! aggregate-joined node listing.
//!
//! # Aggregate Ownership
//!
//! A node's aggregate reference (`data.counterId`) is owned by the server.
//! Batches can neither set nor clear it: patched nodes keep the stored
//! reference and inserted nodes start without one. The joined `data.count`
//! is dropped before anything is persisted. Removing a node deletes its
//! aggregate with it.

use crate::db::{EdgeEndpoints, NodeRecord};
use crate::models::{ClientData, DiagramId, FlowEdge, FlowNode, NodeChange, StorageRef, XYPosition};
use crate::operations::{added_ids, apply_changes, auto_connect_target_handle, reconcile, referenced_ids, EntityChange};
use crate::services::access::AccessKind;
use crate::services::batch::{BatchOutcome, WriteKind};
use crate::services::diagram_service::DiagramService;
use crate::services::error::DiagramServiceError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Existing node a freshly created node gets connected from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNodeLink {
    pub id: String,
    /// Handle on the source node the new edge leaves from
    pub handle_position: String,
}

/// Parameters for [`DiagramService::create_node`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeParams {
    /// Author-chosen id; must not exist in the diagram yet
    pub node_id: String,
    pub position: XYPosition,
    /// Initial aggregate value. When given, the aggregate is created eagerly.
    #[serde(default)]
    pub data: Option<ClientData>,
    /// Defaults to `"default"`
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub source_node: Option<SourceNodeLink>,
}

impl CreateNodeParams {
    pub fn new(node_id: impl Into<String>, position: XYPosition) -> Self {
        Self {
            node_id: node_id.into(),
            position,
            data: None,
            node_type: None,
            source_node: None,
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.data = Some(ClientData { count });
        self
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn connected_from(mut self, source_id: impl Into<String>, handle_position: impl Into<String>) -> Self {
        self.source_node = Some(SourceNodeLink {
            id: source_id.into(),
            handle_position: handle_position.into(),
        });
        self
    }
}

/// Result of [`DiagramService::create_node`]
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedNode {
    /// The node as listings present it
    pub node: FlowNode,
    /// Auto-connect edge, when the source node resolved
    pub edge: Option<FlowEdge>,
}

enum NodeWrite {
    Insert(FlowNode),
    Patch(StorageRef, FlowNode),
    /// Node ref, domain id, and the aggregate the node owns
    Delete(StorageRef, String, Option<StorageRef>),
}

impl NodeWrite {
    fn describe(&self) -> (WriteKind, String) {
        match self {
            NodeWrite::Insert(node) => (WriteKind::Insert, node.id.clone()),
            NodeWrite::Patch(_, node) => (WriteKind::Patch, node.id.clone()),
            NodeWrite::Delete(_, id, _) => (WriteKind::Delete, id.clone()),
        }
    }
}

/// Listing shape: joined count in, storage reference out
pub(crate) fn present_node(mut node: FlowNode, count: i64) -> FlowNode {
    node.data.aggregate = None;
    node.data.count = Some(count);
    node
}

impl DiagramService {
    /// Apply a node change batch to the stored diagram
    ///
    /// An `add` whose id is already stored is rejected with
    /// [`DiagramServiceError::DuplicateId`] and every change targeting that id
    /// is dropped from the batch, leaving the stored node intact.
    pub async fn apply_node_changes(
        &self,
        diagram_id: &DiagramId,
        changes: Vec<NodeChange>,
    ) -> Result<BatchOutcome, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Write).await?;
        let _guard = self.locks.lock(diagram_id).await;

        let ids = referenced_ids(&changes);
        tracing::debug!(
            "Applying {} node changes touching {} ids in {}",
            changes.len(),
            ids.len(),
            diagram_id
        );
        let stored = self.fetch_nodes(diagram_id, &ids).await?;

        let mut outcome = BatchOutcome::default();
        let duplicates: HashSet<String> = added_ids(&changes)
            .into_iter()
            .filter(|id| stored.contains_key(id))
            .collect();
        for id in ids.iter().filter(|id| duplicates.contains(*id)) {
            tracing::warn!("Rejecting add of existing node {} in {}", id, diagram_id);
            outcome.reject(id.clone(), DiagramServiceError::duplicate_id(id.clone()));
        }
        let changes: Vec<NodeChange> = changes
            .into_iter()
            .filter(|change| !duplicates.contains(change.entity_id()))
            .collect();

        let prior: Vec<FlowNode> = ids
            .iter()
            .filter(|id| !duplicates.contains(*id))
            .filter_map(|id| stored.get(id))
            .map(|record| record.node.clone())
            .collect();

        let mut next = apply_changes(&changes, &prior);
        for node in &mut next {
            node.data.count = None;
            node.data.aggregate = stored.get(&node.id).and_then(|record| record.node.data.aggregate);
        }

        let plan = reconcile(&prior, next);
        outcome.unchanged = plan.unchanged;

        let mut writes = Vec::with_capacity(plan.inserts.len() + plan.patches.len() + plan.deletes.len());
        writes.extend(plan.inserts.into_iter().map(NodeWrite::Insert));
        for node in plan.patches {
            if let Some(record) = stored.get(&node.id) {
                writes.push(NodeWrite::Patch(record.storage_ref, node));
            }
        }
        for id in plan.deletes {
            if let Some(record) = stored.get(&id) {
                writes.push(NodeWrite::Delete(record.storage_ref, id, record.node.data.aggregate));
            }
        }

        let results = join_all(writes.into_iter().map(move |write| async move {
            let (kind, id) = write.describe();
            (kind, id, self.write_node(diagram_id, write).await)
        }))
        .await;
        for (kind, id, result) in results {
            outcome.record(kind, id, result);
        }

        tracing::info!(
            "Node batch on {}: {} inserted, {} patched, {} deleted, {} unchanged, {} rejected",
            diagram_id,
            outcome.inserted.len(),
            outcome.patched.len(),
            outcome.deleted.len(),
            outcome.unchanged.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Create a node, its aggregate when `data` is given, and optionally an
    /// edge from `source_node`
    ///
    /// The auto-connect edge enters the new node's `"top"` handle when the
    /// source sits below it, `"bottom"` otherwise. An unresolved source node is
    /// logged and skipped.
    pub async fn create_node(
        &self,
        diagram_id: &DiagramId,
        params: CreateNodeParams,
    ) -> Result<CreatedNode, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Write).await?;
        let _guard = self.locks.lock(diagram_id).await;

        if self.store.node_by_id(diagram_id, &params.node_id).await?.is_some() {
            return Err(DiagramServiceError::duplicate_id(params.node_id));
        }

        let mut node = FlowNode::new(params.node_id, params.position);
        if let Some(node_type) = params.node_type {
            node.node_type = Some(node_type);
        }

        let mut count = 0;
        if let Some(data) = params.data {
            let aggregate = self.store.insert_aggregate(diagram_id, data.count).await?;
            node.data.aggregate = Some(aggregate.storage_ref);
            count = aggregate.count;
        }
        let aggregate_ref = node.data.aggregate;

        let record = match self.store.insert_node(diagram_id, node).await {
            Ok(record) => record,
            Err(err) => {
                if let Some(storage_ref) = aggregate_ref {
                    if let Err(cleanup) = self.store.delete_aggregate(storage_ref).await {
                        tracing::warn!("Failed to discard aggregate {}: {}", storage_ref, cleanup);
                    }
                }
                return Err(DiagramServiceError::from_write(err));
            }
        };
        tracing::info!("Created node {} in {}", record.node.id, diagram_id);

        let edge = match params.source_node {
            Some(link) => self.auto_connect(diagram_id, &record, link).await?,
            None => None,
        };

        Ok(CreatedNode {
            node: present_node(record.node, count),
            edge,
        })
    }

    /// Current nodes of the diagram with their aggregate values joined
    ///
    /// Nodes without an aggregate, or whose aggregate is gone, read as 0.
    pub async fn list_nodes(&self, diagram_id: &DiagramId) -> Result<Vec<FlowNode>, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Read).await?;

        let (nodes, aggregates) = tokio::try_join!(
            self.store.nodes_in_diagram(diagram_id),
            self.store.aggregates_in_diagram(diagram_id)
        )?;
        let counts: HashMap<StorageRef, i64> = aggregates
            .into_iter()
            .map(|aggregate| (aggregate.storage_ref, aggregate.count))
            .collect();

        Ok(nodes
            .into_iter()
            .map(|record| {
                let count = record
                    .node
                    .data
                    .aggregate
                    .and_then(|storage_ref| counts.get(&storage_ref).copied())
                    .unwrap_or(0);
                present_node(record.node, count)
            })
            .collect())
    }

    async fn fetch_nodes(
        &self,
        diagram_id: &DiagramId,
        ids: &[String],
    ) -> Result<HashMap<String, NodeRecord>, DiagramServiceError> {
        let fetched = join_all(ids.iter().map(|id| self.store.node_by_id(diagram_id, id))).await;
        let mut records = HashMap::with_capacity(ids.len());
        for record in fetched {
            if let Some(record) = record? {
                records.insert(record.node.id.clone(), record);
            }
        }
        Ok(records)
    }

    async fn write_node(&self, diagram_id: &DiagramId, write: NodeWrite) -> Result<(), DiagramServiceError> {
        let result = match write {
            NodeWrite::Insert(node) => self.store.insert_node(diagram_id, node).await.map(drop),
            NodeWrite::Patch(storage_ref, node) => self.store.patch_node(storage_ref, node).await.map(drop),
            NodeWrite::Delete(storage_ref, id, aggregate) => {
                self.store.delete_node(storage_ref).await?;
                if let Some(aggregate) = aggregate {
                    if let Err(err) = self.store.delete_aggregate(aggregate).await {
                        tracing::warn!("Failed to discard aggregate {} of node {}: {}", aggregate, id, err);
                    }
                }
                Ok(())
            }
        };
        result.map_err(DiagramServiceError::from_write)
    }

    async fn auto_connect(
        &self,
        diagram_id: &DiagramId,
        created: &NodeRecord,
        link: SourceNodeLink,
    ) -> Result<Option<FlowEdge>, DiagramServiceError> {
        let Some(source) = self.store.node_by_id(diagram_id, &link.id).await? else {
            tracing::warn!(
                "Auto-connect source {} not found in {}, skipping edge to {}",
                link.id,
                diagram_id,
                created.node.id
            );
            return Ok(None);
        };

        let target_handle = auto_connect_target_handle(source.node.position, created.node.position);
        let edge = FlowEdge::new(self.ids.next_id(), link.id.as_str(), created.node.id.as_str())
            .with_handles(Some(link.handle_position.as_str()), Some(target_handle));
        let endpoints = EdgeEndpoints {
            source: source.storage_ref,
            target: created.storage_ref,
        };

        let existing = self
            .existing_connection(diagram_id, &link.id, &created.node.id, endpoints, |stored| {
                stored.same_connection(&edge)
            })
            .await?;
        if let Some(existing) = existing {
            tracing::debug!("Auto-connect {} -> {} reuses edge {}", link.id, created.node.id, existing.id);
            return Ok(Some(existing));
        }

        let record = self
            .store
            .insert_edge(diagram_id, endpoints, edge)
            .await
            .map_err(DiagramServiceError::from_write)?;
        tracing::debug!("Auto-connected {} -> {}", link.id, created.node.id);
        Ok(Some(record.edge))
    }
}
