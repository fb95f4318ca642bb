//! Data Models
//!
//! Domain types shared by the store, the mutation services and the client-side
//! prediction layer.

pub mod aggregate;
pub mod change;
pub mod edge;
pub mod ids;
pub mod node;

pub use aggregate::{AggregateWrite, ClientData};
pub use change::{EdgeChange, NodeChange};
pub use edge::{Connection, FlowEdge};
pub use ids::{DiagramId, IdGenerator, SequentialIdGenerator, StorageRef, UuidIdGenerator};
pub use node::{Dimensions, FlowNode, NodeData, XYPosition};
