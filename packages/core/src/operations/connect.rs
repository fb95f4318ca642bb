//! Connection helpers shared by the connect mutation and its prediction

use crate::models::{Connection, FlowEdge, XYPosition};

/// Build the edge a valid connection proposal would create
///
/// Returns `None` when the proposal lacks a source or a target.
pub fn edge_from_connection(connection: &Connection, id: impl Into<String>) -> Option<FlowEdge> {
    let (source, target) = connection.endpoints()?;
    Some(
        FlowEdge::new(id, source, target)
            .with_handles(connection.source_handle.as_deref(), connection.target_handle.as_deref()),
    )
}

/// Whether any edge already joins the proposal's endpoints and handles
pub fn connection_exists(edges: &[FlowEdge], connection: &Connection) -> bool {
    edges.iter().any(|edge| edge.matches_connection(connection))
}

/// Predicted edge list after connecting, without touching any store
///
/// Invalid or duplicate proposals leave the list unchanged. Endpoint existence
/// is checked against `node_ids` when given.
pub fn add_connection(
    connection: &Connection,
    edges: &[FlowEdge],
    node_ids: Option<&[&str]>,
    id: impl Into<String>,
) -> Vec<FlowEdge> {
    let mut next = edges.to_vec();
    if connection_exists(edges, connection) {
        return next;
    }
    let Some(edge) = edge_from_connection(connection, id) else {
        return next;
    };
    if let Some(known) = node_ids {
        if !known.contains(&edge.source.as_str()) || !known.contains(&edge.target.as_str()) {
            return next;
        }
    }
    next.push(edge);
    next
}

/// Handle on a freshly created node that an auto-connect edge attaches to
///
/// A source sitting below the new node connects into its top handle.
pub fn auto_connect_target_handle(source: XYPosition, created: XYPosition) -> &'static str {
    if source.y > created.y {
        "top"
    } else {
        "bottom"
    }
}
