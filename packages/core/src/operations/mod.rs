//! Pure Graph Operations
//!
//! Logic with no I/O, shared by the authoritative services and the client
//! prediction layer:
//!
//! - [`apply_changes`] - change batch application
//! - [`reconcile`] - insert/patch/delete planning for an applied batch
//! - [`connect`] - connection proposal helpers

pub mod apply_changes;
pub mod connect;
pub mod reconcile;

pub use apply_changes::{
    added_ids, apply_changes, apply_edge_changes, apply_node_changes, referenced_ids, ChangeTarget,
    EntityChange, FlowEntity,
};
pub use connect::{add_connection, auto_connect_target_handle, connection_exists, edge_from_connection};
pub use reconcile::{reconcile, Reconciliation};
