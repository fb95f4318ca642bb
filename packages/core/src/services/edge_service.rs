//! Edge Entry Points
//!
//! Edge change batches, idempotent connect, and the edge listing.
//!
//! Every edge write resolves the edge's `source` and `target` domain ids to
//! node storage references immediately before writing. An edge naming a node
//! that does not exist in the diagram is rejected on its own; the other edges
//! of the batch are unaffected.

use crate::db::{EdgeEndpoints, EdgeRecord};
use crate::models::{Connection, DiagramId, EdgeChange, FlowEdge, StorageRef};
use crate::operations::{added_ids, apply_changes, edge_from_connection, reconcile, referenced_ids, EntityChange};
use crate::services::access::AccessKind;
use crate::services::batch::{BatchOutcome, WriteKind};
use crate::services::diagram_service::DiagramService;
use crate::services::error::DiagramServiceError;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};

/// Result of [`DiagramService::connect`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// A new edge was stored
    Inserted(FlowEdge),
    /// An identical connection already exists; nothing was written
    Skipped,
}

impl ConnectOutcome {
    pub fn edge(&self) -> Option<&FlowEdge> {
        match self {
            ConnectOutcome::Inserted(edge) => Some(edge),
            ConnectOutcome::Skipped => None,
        }
    }
}

enum EdgeWrite {
    Insert(FlowEdge),
    Patch(StorageRef, FlowEdge),
    Delete(StorageRef, String),
}

impl EdgeWrite {
    fn describe(&self) -> (WriteKind, String) {
        match self {
            EdgeWrite::Insert(edge) => (WriteKind::Insert, edge.id.clone()),
            EdgeWrite::Patch(_, edge) => (WriteKind::Patch, edge.id.clone()),
            EdgeWrite::Delete(_, id) => (WriteKind::Delete, id.clone()),
        }
    }
}

type ConnectionKey = (String, String, Option<String>, Option<String>);

fn connection_key(edge: &FlowEdge) -> ConnectionKey {
    (
        edge.source.clone(),
        edge.target.clone(),
        edge.source_handle.clone(),
        edge.target_handle.clone(),
    )
}

impl DiagramService {
    /// Apply an edge change batch to the stored diagram
    ///
    /// Deletes are written first, then inserts and patches. Rejections (missing
    /// endpoint, duplicate id, duplicate connection) are per edge.
    pub async fn apply_edge_changes(
        &self,
        diagram_id: &DiagramId,
        changes: Vec<EdgeChange>,
    ) -> Result<BatchOutcome, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Write).await?;
        let _guard = self.locks.lock(diagram_id).await;

        let ids = referenced_ids(&changes);
        tracing::debug!(
            "Applying {} edge changes touching {} ids in {}",
            changes.len(),
            ids.len(),
            diagram_id
        );
        let stored = self.fetch_edges(diagram_id, &ids).await?;

        let mut outcome = BatchOutcome::default();
        let duplicates: HashSet<String> = added_ids(&changes)
            .into_iter()
            .filter(|id| stored.contains_key(id))
            .collect();
        for id in ids.iter().filter(|id| duplicates.contains(*id)) {
            tracing::warn!("Rejecting add of existing edge {} in {}", id, diagram_id);
            outcome.reject(id.clone(), DiagramServiceError::duplicate_id(id.clone()));
        }
        let changes: Vec<EdgeChange> = changes
            .into_iter()
            .filter(|change| !duplicates.contains(change.entity_id()))
            .collect();

        let prior: Vec<FlowEdge> = ids
            .iter()
            .filter(|id| !duplicates.contains(*id))
            .filter_map(|id| stored.get(id))
            .map(|record| record.edge.clone())
            .collect();

        let plan = reconcile(&prior, apply_changes(&changes, &prior));
        outcome.unchanged = plan.unchanged;

        let deletes: Vec<EdgeWrite> = plan
            .deletes
            .into_iter()
            .filter_map(|id| stored.get(&id).map(|record| EdgeWrite::Delete(record.storage_ref, id)))
            .collect();
        self.run_edge_writes(diagram_id, deletes, &mut outcome).await;

        let mut claimed: HashSet<ConnectionKey> = HashSet::new();
        let mut upserts = Vec::with_capacity(plan.patches.len() + plan.inserts.len());
        for edge in plan.patches {
            let Some(record) = stored.get(&edge.id) else {
                continue;
            };
            if claimed.insert(connection_key(&edge)) {
                upserts.push(EdgeWrite::Patch(record.storage_ref, edge));
            } else {
                outcome.reject(edge.id.clone(), DiagramServiceError::duplicate_connection(edge.id));
            }
        }
        for edge in plan.inserts {
            if claimed.insert(connection_key(&edge)) {
                upserts.push(EdgeWrite::Insert(edge));
            } else {
                outcome.reject(edge.id.clone(), DiagramServiceError::duplicate_connection(edge.id));
            }
        }
        self.run_edge_writes(diagram_id, upserts, &mut outcome).await;

        tracing::info!(
            "Edge batch on {}: {} inserted, {} patched, {} deleted, {} unchanged, {} rejected",
            diagram_id,
            outcome.inserted.len(),
            outcome.patched.len(),
            outcome.deleted.len(),
            outcome.unchanged.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Connect two nodes unless an identical connection already exists
    ///
    /// Identical means the same `(source, target, sourceHandle, targetHandle)`,
    /// where a missing handle equals `null`. Repeating a connect gesture is
    /// therefore idempotent. A matching edge left pointing at a since re-created
    /// endpoint node is re-pointed at the current record instead of duplicated.
    pub async fn connect(
        &self,
        diagram_id: &DiagramId,
        connection: Connection,
    ) -> Result<ConnectOutcome, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Write).await?;
        let Some((source_id, target_id)) = connection.endpoints() else {
            return Err(DiagramServiceError::invalid_connection(
                "connection needs both a source and a target",
            ));
        };
        let _guard = self.locks.lock(diagram_id).await;

        let (source, target) = tokio::try_join!(
            self.store.node_by_id(diagram_id, source_id),
            self.store.node_by_id(diagram_id, target_id)
        )?;
        let source = source.ok_or_else(|| DiagramServiceError::endpoint_not_found(source_id))?;
        let target = target.ok_or_else(|| DiagramServiceError::endpoint_not_found(target_id))?;

        let endpoints = EdgeEndpoints {
            source: source.storage_ref,
            target: target.storage_ref,
        };
        let existing = self
            .existing_connection(diagram_id, source_id, target_id, endpoints, |edge| {
                edge.matches_connection(&connection)
            })
            .await?;
        if existing.is_some() {
            tracing::debug!("Skipping duplicate connection {} -> {} in {}", source_id, target_id, diagram_id);
            return Ok(ConnectOutcome::Skipped);
        }

        let edge = edge_from_connection(&connection, self.ids.next_id()).ok_or_else(|| {
            DiagramServiceError::invalid_connection("connection needs both a source and a target")
        })?;
        let record = self
            .store
            .insert_edge(diagram_id, endpoints, edge)
            .await
            .map_err(DiagramServiceError::from_write)?;

        tracing::info!("Connected {} -> {} as {} in {}", source_id, target_id, record.edge.id, diagram_id);
        Ok(ConnectOutcome::Inserted(record.edge))
    }

    /// Current edges of the diagram
    pub async fn list_edges(&self, diagram_id: &DiagramId) -> Result<Vec<FlowEdge>, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Read).await?;
        let records = self.store.edges_in_diagram(diagram_id).await?;
        Ok(records.into_iter().map(|record| record.edge).collect())
    }

    /// Stored edge from `source_id` to `target_id` accepted by `matches`
    ///
    /// A match still pointing at a deleted endpoint record is re-pointed at
    /// `endpoints` before it is returned.
    pub(crate) async fn existing_connection(
        &self,
        diagram_id: &DiagramId,
        source_id: &str,
        target_id: &str,
        endpoints: EdgeEndpoints,
        matches: impl Fn(&FlowEdge) -> bool,
    ) -> Result<Option<FlowEdge>, DiagramServiceError> {
        let parallel = self.store.edges_between(diagram_id, source_id, target_id).await?;
        let Some(existing) = parallel.into_iter().find(|record| matches(&record.edge)) else {
            return Ok(None);
        };
        if existing.endpoints == endpoints {
            return Ok(Some(existing.edge));
        }

        tracing::info!("Re-pointing edge {} at re-created endpoints in {}", existing.edge.id, diagram_id);
        let record = self
            .store
            .patch_edge(existing.storage_ref, endpoints, existing.edge)
            .await
            .map_err(DiagramServiceError::from_write)?;
        Ok(Some(record.edge))
    }

    async fn fetch_edges(
        &self,
        diagram_id: &DiagramId,
        ids: &[String],
    ) -> Result<HashMap<String, EdgeRecord>, DiagramServiceError> {
        let fetched = join_all(ids.iter().map(|id| self.store.edge_by_id(diagram_id, id))).await;
        let mut records = HashMap::with_capacity(ids.len());
        for record in fetched {
            if let Some(record) = record? {
                records.insert(record.edge.id.clone(), record);
            }
        }
        Ok(records)
    }

    async fn run_edge_writes(&self, diagram_id: &DiagramId, writes: Vec<EdgeWrite>, outcome: &mut BatchOutcome) {
        let results = join_all(writes.into_iter().map(move |write| async move {
            let (kind, id) = write.describe();
            (kind, id, self.write_edge(diagram_id, write).await)
        }))
        .await;
        for (kind, id, result) in results {
            outcome.record(kind, id, result);
        }
    }

    async fn write_edge(&self, diagram_id: &DiagramId, write: EdgeWrite) -> Result<(), DiagramServiceError> {
        match write {
            EdgeWrite::Insert(edge) => {
                let endpoints = self.resolve_edge_endpoints(diagram_id, &edge).await?;
                self.ensure_unique_connection(diagram_id, &edge).await?;
                self.store
                    .insert_edge(diagram_id, endpoints, edge)
                    .await
                    .map_err(DiagramServiceError::from_write)?;
            }
            EdgeWrite::Patch(storage_ref, edge) => {
                let endpoints = self.resolve_edge_endpoints(diagram_id, &edge).await?;
                self.ensure_unique_connection(diagram_id, &edge).await?;
                self.store
                    .patch_edge(storage_ref, endpoints, edge)
                    .await
                    .map_err(DiagramServiceError::from_write)?;
            }
            EdgeWrite::Delete(storage_ref, _) => {
                self.store
                    .delete_edge(storage_ref)
                    .await
                    .map_err(DiagramServiceError::from_write)?;
            }
        }
        Ok(())
    }

    async fn resolve_edge_endpoints(
        &self,
        diagram_id: &DiagramId,
        edge: &FlowEdge,
    ) -> Result<EdgeEndpoints, DiagramServiceError> {
        let (source, target) = tokio::try_join!(
            self.store.node_by_id(diagram_id, &edge.source),
            self.store.node_by_id(diagram_id, &edge.target)
        )?;

        match (source, target) {
            (Some(source), Some(target)) => Ok(EdgeEndpoints {
                source: source.storage_ref,
                target: target.storage_ref,
            }),
            (source, _) => {
                let missing = if source.is_none() { &edge.source } else { &edge.target };
                tracing::warn!("Rejecting edge {}: node {} not in {}", edge.id, missing, diagram_id);
                Err(DiagramServiceError::referential_integrity(&edge.id, missing))
            }
        }
    }

    async fn ensure_unique_connection(
        &self,
        diagram_id: &DiagramId,
        edge: &FlowEdge,
    ) -> Result<(), DiagramServiceError> {
        let parallel = self.store.edges_between(diagram_id, &edge.source, &edge.target).await?;
        if parallel
            .iter()
            .any(|record| record.edge.id != edge.id && record.edge.same_connection(edge))
        {
            return Err(DiagramServiceError::duplicate_connection(&edge.id));
        }
        Ok(())
    }
}
