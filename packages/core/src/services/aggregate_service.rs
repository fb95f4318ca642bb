//! Node Aggregates
//!
//! Each node may own one aggregate record, referenced from its payload. The
//! record is created on the first write and patched in place afterwards.
//! Creation happens before the node is linked to it, so a node never points
//! at an aggregate that does not exist.

use crate::db::{Collection, NodeRecord};
use crate::models::{AggregateWrite, DiagramId};
use crate::services::access::AccessKind;
use crate::services::diagram_service::DiagramService;
use crate::services::error::DiagramServiceError;

impl DiagramService {
    /// Write `node_id`'s aggregate and return its new value
    ///
    /// A reference to an aggregate that no longer exists is treated like a
    /// missing one: a fresh record is created and linked.
    pub async fn write_node_aggregate(
        &self,
        diagram_id: &DiagramId,
        node_id: &str,
        write: AggregateWrite,
    ) -> Result<i64, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Write).await?;
        let _guard = self.locks.lock(diagram_id).await;

        let node = self
            .store
            .node_by_id(diagram_id, node_id)
            .await?
            .ok_or_else(|| DiagramServiceError::not_found(Collection::Nodes, node_id))?;

        if let Some(storage_ref) = node.node.data.aggregate {
            if let Some(current) = self.store.aggregate(storage_ref).await? {
                let patched = self
                    .store
                    .patch_aggregate(storage_ref, write.apply_to(current.count))
                    .await?;
                tracing::debug!("Aggregate of {} now {}", node_id, patched.count);
                return Ok(patched.count);
            }
            tracing::warn!("Node {} references missing aggregate {}, recreating", node_id, storage_ref);
        }

        self.create_linked_aggregate(diagram_id, node, write.apply_to(0)).await
    }

    /// Current aggregate value of `node_id`; 0 when none was ever written
    pub async fn get_node_aggregate(&self, diagram_id: &DiagramId, node_id: &str) -> Result<i64, DiagramServiceError> {
        self.authorize(diagram_id, AccessKind::Read).await?;

        let node = self
            .store
            .node_by_id(diagram_id, node_id)
            .await?
            .ok_or_else(|| DiagramServiceError::not_found(Collection::Nodes, node_id))?;

        let Some(storage_ref) = node.node.data.aggregate else {
            return Ok(0);
        };
        Ok(self
            .store
            .aggregate(storage_ref)
            .await?
            .map(|aggregate| aggregate.count)
            .unwrap_or(0))
    }

    async fn create_linked_aggregate(
        &self,
        diagram_id: &DiagramId,
        record: NodeRecord,
        value: i64,
    ) -> Result<i64, DiagramServiceError> {
        let aggregate = self.store.insert_aggregate(diagram_id, value).await?;

        let mut node = record.node;
        node.data.aggregate = Some(aggregate.storage_ref);
        if let Err(err) = self.store.patch_node(record.storage_ref, node).await {
            if let Err(cleanup) = self.store.delete_aggregate(aggregate.storage_ref).await {
                tracing::warn!("Failed to discard aggregate {}: {}", aggregate.storage_ref, cleanup);
            }
            return Err(err.into());
        }

        tracing::info!(
            "Created aggregate {} for node in {} with value {}",
            aggregate.storage_ref,
            diagram_id,
            aggregate.count
        );
        Ok(aggregate.count)
    }
}
