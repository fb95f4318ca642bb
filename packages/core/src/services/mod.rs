//! Business Services
//!
//! - [`DiagramService`] - authoritative node/edge/aggregate mutations and reads
//! - [`LiveQuery`] - listings that refresh on store writes
//! - [`AccessPolicy`] - per-diagram access decisions consulted on every call
//! - [`DiagramLocks`] - per-diagram write serialization
//!
//! Services coordinate between the entity store and the pure graph
//! operations, enforcing referential integrity, id uniqueness and aggregate
//! ownership.

pub mod access;
mod aggregate_service;
pub mod batch;
pub mod diagram_locks;
pub mod diagram_service;
mod edge_service;
pub mod error;
pub mod live_query;
mod node_service;


pub use access::{AccessKind, AccessPolicy, AllowAll, StaticAccess};
pub use batch::{BatchOutcome, RejectedEntity};
pub use diagram_locks::DiagramLocks;
pub use diagram_service::DiagramService;
pub use edge_service::ConnectOutcome;
pub use error::DiagramServiceError;
pub use live_query::{Listing, LiveQuery};
pub use node_service::{CreateNodeParams, CreatedNode, SourceNodeLink};
