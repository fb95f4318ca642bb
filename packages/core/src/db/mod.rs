//! Storage Layer
//!
//! - [`EntityStore`] - async trait over indexed node/edge/aggregate collections
//! - [`MemoryStore`] - in-process reference implementation
//! - [`StoreEvent`] - write notifications broadcast to subscribers
//!
//! The durable substrate is an external collaborator; services only ever talk
//! to it through [`EntityStore`].

pub mod entity_store;
mod error;
pub mod events;
mod memory_store;

pub use entity_store::{AggregateRecord, EdgeEndpoints, EdgeRecord, EntityStore, NodeRecord};
pub use error::DatabaseError;
pub use events::{Collection, StoreEvent};
pub use memory_store::{MemoryStore, DEFAULT_EVENT_CHANNEL_CAPACITY};
