//! Optimistic Prediction
//!
//! An [`OptimisticView`] holds the last authoritative entity list plus the
//! local change batches that have not been confirmed yet. The view shown to
//! the user is the base with every pending batch applied in submission order,
//! through the same [`apply_changes`] the server runs.
//!
//! When a batch's authoritative result arrives its overlay is dropped and the
//! base is replaced; batches still pending keep applying on top. A failed
//! batch is discarded, rolling its prediction back.

use crate::models::{AggregateWrite, Connection, EdgeChange, FlowEdge, NodeChange};
use crate::operations::{add_connection, apply_changes, EntityChange};
use std::collections::BTreeMap;
use std::fmt;

/// Handle for a locally submitted, not yet confirmed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(u64);

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending-{}", self.0)
    }
}

/// Authoritative base plus pending local batches
pub struct OptimisticView<C: EntityChange> {
    base: Vec<C::Entity>,
    pending: BTreeMap<PendingId, Vec<C>>,
    next_pending: u64,
}

impl<C: EntityChange> OptimisticView<C> {
    pub fn new(base: Vec<C::Entity>) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
            next_pending: 1,
        }
    }

    /// Last authoritative list
    pub fn base(&self) -> &[C::Entity] {
        &self.base
    }

    /// Predicted list: the base with all pending batches applied in order
    pub fn view(&self) -> Vec<C::Entity> {
        self.pending
            .values()
            .fold(self.base.clone(), |entities, changes| apply_changes(changes, &entities))
    }

    pub fn submit(&mut self, changes: Vec<C>) -> PendingId {
        let id = PendingId(self.next_pending);
        self.next_pending += 1;
        self.pending.insert(id, changes);
        id
    }

    pub fn pending(&self, id: PendingId) -> Option<&[C]> {
        self.pending.get(&id).map(Vec::as_slice)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Confirm `id` with the authoritative list that includes its effects
    pub fn settle(&mut self, id: PendingId, authoritative: Vec<C::Entity>) -> bool {
        let known = self.pending.remove(&id).is_some();
        self.base = authoritative;
        known
    }

    /// Drop `id`'s prediction
    pub fn reject(&mut self, id: PendingId) -> Option<Vec<C>> {
        self.pending.remove(&id)
    }

    /// Adopt a newer authoritative list without touching pending batches
    pub fn replace_base(&mut self, base: Vec<C::Entity>) {
        self.base = base;
    }
}

impl OptimisticView<EdgeChange> {
    /// Predict a connect gesture
    ///
    /// The provisional edge is only shown when the proposal is complete, not a
    /// duplicate of a visible edge, and (when `node_ids` is given) joins
    /// visible nodes. Otherwise an empty batch is submitted, so the returned
    /// handle can still be committed.
    pub fn submit_connection(
        &mut self,
        connection: &Connection,
        node_ids: Option<&[&str]>,
        provisional_id: impl Into<String>,
    ) -> PendingId {
        let current = self.view();
        let mut next = add_connection(connection, &current, node_ids, provisional_id);
        let changes = if next.len() > current.len() {
            next.pop()
                .map(|item: FlowEdge| vec![EdgeChange::Add { item }])
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        self.submit(changes)
    }
}

impl OptimisticView<NodeChange> {
    /// Predict an aggregate write by updating the node's joined count
    ///
    /// Only the count is overlaid, so rejecting an earlier batch still rolls
    /// back that batch's own edits.
    pub fn submit_aggregate(&mut self, node_id: &str, write: AggregateWrite) -> PendingId {
        self.submit(vec![NodeChange::count(node_id, write)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowNode, XYPosition};
    use crate::operations::apply_node_changes;

    fn node(id: &str, x: f64) -> FlowNode {
        FlowNode::new(id, XYPosition::new(x, 0.0))
    }

    fn ids(nodes: &[FlowNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_view_matches_server_applicator() {
        let base = vec![node("a", 0.0), node("b", 0.0)];
        let changes = vec![
            NodeChange::moved("a", XYPosition::new(9.0, 9.0)),
            NodeChange::remove("b"),
            NodeChange::Add { item: node("c", 1.0) },
        ];

        let mut view = OptimisticView::new(base.clone());
        view.submit(changes.clone());

        assert_eq!(view.view(), apply_node_changes(&changes, &base));
    }

    #[test]
    fn test_settle_keeps_later_predictions() {
        let mut view = OptimisticView::new(vec![node("a", 0.0)]);
        let first = view.submit(vec![NodeChange::Add { item: node("b", 0.0) }]);
        let second = view.submit(vec![NodeChange::moved("a", XYPosition::new(5.0, 5.0))]);

        // Server confirms the first batch only
        assert!(view.settle(first, vec![node("a", 0.0), node("b", 0.0)]));

        let predicted = view.view();
        assert_eq!(ids(&predicted), vec!["a", "b"]);
        assert_eq!(predicted[0].position, XYPosition::new(5.0, 5.0));
        assert!(view.pending(second).is_some());
        assert_eq!(view.pending_count(), 1);
    }

    #[test]
    fn test_reject_rolls_prediction_back() {
        let mut view = OptimisticView::new(vec![node("a", 0.0)]);
        let id = view.submit(vec![NodeChange::remove("a")]);
        assert!(view.view().is_empty());

        assert!(view.reject(id).is_some());
        assert_eq!(ids(&view.view()), vec!["a"]);
        assert!(view.reject(id).is_none());
    }

    #[test]
    fn test_connection_prediction_suppresses_duplicates() {
        let mut view: OptimisticView<EdgeChange> = OptimisticView::new(Vec::new());
        let known: &[&str] = &["a", "b"];

        let first = view.submit_connection(&Connection::new("a", "b"), Some(known), "tmp-1");
        let repeat = view.submit_connection(&Connection::new("a", "b"), Some(known), "tmp-2");
        let dangling = view.submit_connection(&Connection::new("a", "zzz"), Some(known), "tmp-3");

        assert_eq!(view.pending(first).map(<[EdgeChange]>::len), Some(1));
        assert_eq!(view.pending(repeat).map(<[EdgeChange]>::len), Some(0));
        assert_eq!(view.pending(dangling).map(<[EdgeChange]>::len), Some(0));

        let edges = view.view();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, "tmp-1");
    }

    #[test]
    fn test_aggregate_prediction_updates_count() {
        let mut view = OptimisticView::new(vec![node("a", 0.0)]);
        view.submit_aggregate("a", AggregateWrite::Add(2));
        view.submit_aggregate("a", AggregateWrite::Add(3));
        let missing = view.submit_aggregate("ghost", AggregateWrite::Set(1));

        let predicted = view.view();
        assert_eq!(ids(&predicted), vec!["a"]);
        assert_eq!(predicted[0].data.count, Some(5));

        // Unknown nodes are left alone, like any other field update
        assert!(view.reject(missing).is_some());
        assert_eq!(view.view(), predicted);
    }

    #[test]
    fn test_rejecting_move_keeps_later_count_prediction() {
        let mut view = OptimisticView::new(vec![node("a", 0.0)]);
        let moved = view.submit(vec![NodeChange::moved("a", XYPosition::new(50.0, 50.0))]);
        view.submit_aggregate("a", AggregateWrite::Add(1));

        view.reject(moved);

        let predicted = view.view();
        assert_eq!(predicted[0].position, XYPosition::new(0.0, 0.0));
        assert_eq!(predicted[0].data.count, Some(1));
    }
}
