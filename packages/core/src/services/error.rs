//! Service Layer Error Types
//!
//! Failures reported by the diagram mutation and read entry points. None of
//! them are retried internally: they are logical failures, surfaced to the
//! caller together with the mutation's result.

use crate::db::{Collection, DatabaseError};
use crate::models::DiagramId;
use crate::services::access::AccessKind;
use thiserror::Error;

/// Diagram service errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagramServiceError {
    /// The access policy denied the operation
    #[error("{access} access denied for diagram {diagram_id}")]
    Unauthorized {
        diagram_id: DiagramId,
        access: AccessKind,
    },

    /// An edge write named a node that does not exist in the diagram
    #[error("Edge {edge_id} references missing node {missing}")]
    ReferentialIntegrity { edge_id: String, missing: String },

    /// The targeted domain id is absent from the store
    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: String },

    /// A connect proposal named an unresolved node
    #[error("Connection endpoint not found: {node_id}")]
    EndpointNotFound { node_id: String },

    /// A connect proposal without a source or a target
    #[error("Invalid connection: {reason}")]
    InvalidConnection { reason: String },

    /// An author-chosen id collides with a stored entity
    #[error("Id already exists in diagram: {id}")]
    DuplicateId { id: String },

    /// Another edge already joins the same endpoints and handles
    #[error("Edge {edge_id} duplicates an existing connection")]
    DuplicateConnection { edge_id: String },

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl DiagramServiceError {
    pub fn unauthorized(diagram_id: &DiagramId, access: AccessKind) -> Self {
        Self::Unauthorized {
            diagram_id: diagram_id.clone(),
            access,
        }
    }

    pub fn referential_integrity(edge_id: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            edge_id: edge_id.into(),
            missing: missing.into(),
        }
    }

    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn endpoint_not_found(node_id: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            node_id: node_id.into(),
        }
    }

    pub fn invalid_connection(reason: impl Into<String>) -> Self {
        Self::InvalidConnection {
            reason: reason.into(),
        }
    }

    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    pub fn duplicate_connection(edge_id: impl Into<String>) -> Self {
        Self::DuplicateConnection {
            edge_id: edge_id.into(),
        }
    }

    /// Map a failed store write, surfacing unique-index hits as id collisions
    pub(crate) fn from_write(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation { key, .. } => Self::DuplicateId { id: key },
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_maps_to_duplicate_id() {
        let err = DiagramServiceError::from_write(DatabaseError::unique_violation("nodes.id", "n1"));
        assert_eq!(err, DiagramServiceError::duplicate_id("n1"));

        let err = DiagramServiceError::from_write(DatabaseError::operation_failed("disk"));
        assert!(matches!(err, DiagramServiceError::Database(_)));
    }

    #[test]
    fn test_messages_name_the_entity() {
        let err = DiagramServiceError::not_found(Collection::Nodes, "n9");
        assert_eq!(err.to_string(), "node not found: n9");

        let err = DiagramServiceError::unauthorized(&DiagramId::from("d1"), AccessKind::Write);
        assert_eq!(err.to_string(), "write access denied for diagram d1");
    }
}
