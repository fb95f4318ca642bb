//! Access Decisions
//!
//! The services ask an [`AccessPolicy`] before every call. A denial is
//! reported as [`crate::services::DiagramServiceError::Unauthorized`] before
//! anything is read or written.

use crate::models::DiagramId;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Kind of access an operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        })
    }
}

/// Per-diagram allow/deny decisions, evaluated on every call
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn can_read(&self, diagram_id: &DiagramId) -> bool;

    async fn can_write(&self, diagram_id: &DiagramId) -> bool;

    async fn allows(&self, diagram_id: &DiagramId, access: AccessKind) -> bool {
        match access {
            AccessKind::Read => self.can_read(diagram_id).await,
            AccessKind::Write => self.can_write(diagram_id).await,
        }
    }
}

/// Grants everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl AccessPolicy for AllowAll {
    async fn can_read(&self, _diagram_id: &DiagramId) -> bool {
        true
    }

    async fn can_write(&self, _diagram_id: &DiagramId) -> bool {
        true
    }
}

/// Fixed allow lists; anything not listed is denied
///
/// Write access implies read access.
#[derive(Debug, Default, Clone)]
pub struct StaticAccess {
    readable: HashSet<DiagramId>,
    writable: HashSet<DiagramId>,
}

impl StaticAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_read(mut self, diagram_id: impl Into<DiagramId>) -> Self {
        self.readable.insert(diagram_id.into());
        self
    }

    pub fn allow_write(mut self, diagram_id: impl Into<DiagramId>) -> Self {
        let diagram_id = diagram_id.into();
        self.readable.insert(diagram_id.clone());
        self.writable.insert(diagram_id);
        self
    }
}

#[async_trait]
impl AccessPolicy for StaticAccess {
    async fn can_read(&self, diagram_id: &DiagramId) -> bool {
        self.readable.contains(diagram_id)
    }

    async fn can_write(&self, diagram_id: &DiagramId) -> bool {
        self.writable.contains(diagram_id)
    }
}
