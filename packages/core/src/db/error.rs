//! Database Error Types
//!
//! Errors raised by [`crate::db::EntityStore`] implementations. Service-level
//! failures (authorization, referential integrity) are modeled separately in
//! [`crate::services::DiagramServiceError`].

use crate::models::StorageRef;
use thiserror::Error;

/// Entity store operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// A unique index already holds the key
    #[error("Unique index '{index}' already contains key '{key}'")]
    UniqueViolation { index: &'static str, key: String },

    /// No record exists for the storage reference
    #[error("Record not found: {storage_ref}")]
    RecordNotFound { storage_ref: StorageRef },

    /// Backend failure with context
    #[error("Store operation failed: {context}")]
    OperationFailed { context: String },
}

impl DatabaseError {
    /// Create a unique index violation error
    pub fn unique_violation(index: &'static str, key: impl Into<String>) -> Self {
        Self::UniqueViolation {
            index,
            key: key.into(),
        }
    }

    /// Create a record not found error
    pub fn record_not_found(storage_ref: StorageRef) -> Self {
        Self::RecordNotFound { storage_ref }
    }

    /// Create an operation failed error
    pub fn operation_failed(context: impl Into<String>) -> Self {
        Self::OperationFailed {
            context: context.into(),
        }
    }
}
