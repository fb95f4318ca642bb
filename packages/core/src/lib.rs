//! FlowSync Core - Collaborative Diagram Reconciliation
//!
//! This crate provides the change-reconciliation engine behind a collaborative
//! node-link diagram editor: change batches against a node/edge graph are
//! applied to durable state under referential and uniqueness invariants, and
//! clients predict the effect of their own edits before the authoritative
//! result arrives.
//!
//! # Architecture
//!
//! - **One applicator, two callers**: the pure change applicator in
//!   [`operations`] runs both on the authoritative path ([`services`]) and in
//!   the client prediction layer ([`client`]), so predictions cannot drift.
//! - **Two id spaces**: author-chosen domain ids drive all domain logic;
//!   store-assigned storage references only target writes.
//! - **Indexed store**: mutations fetch only the records a batch references.
//! - **Read-time joins**: node aggregates are referenced, never copied.
//!
//! # Modules
//!
//! - [`models`] - Nodes, edges, change operations, identifiers
//! - [`operations`] - Pure change application, reconciliation, connect helpers
//! - [`db`] - Entity store trait, in-memory store, store events
//! - [`services`] - Authoritative mutations, listings, live queries, access
//! - [`client`] - Optimistic views and the diagram session
//! - [`config`] - Session configuration

pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use client::{DiagramSession, OptimisticView, PendingId, SessionError};
pub use config::{ConfigError, SessionConfig};
pub use db::{DatabaseError, EntityStore, MemoryStore, StoreEvent};
pub use models::*;
pub use operations::*;
pub use services::*;
