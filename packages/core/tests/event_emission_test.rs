//! Event Emission Tests
//!
//! Verifies that every committed store write emits exactly one event tagged
//! with its diagram, that rejected writes emit nothing, and that live queries
//! turn those events into refreshed listings.

#[cfg(test)]
mod event_emission_tests {
    use anyhow::Result;
    use flowsync_core::db::{Collection, MemoryStore, StoreEvent};
    use flowsync_core::models::{
        AggregateWrite, Connection, DiagramId, EdgeChange, FlowEdge, FlowNode, NodeChange, XYPosition,
    };
    use flowsync_core::services::{CreateNodeParams, DiagramService, LiveQuery};
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tokio::time::{timeout, Duration};

    /// Helper to create a service over a fresh in-memory store
    fn create_test_service() -> Arc<DiagramService> {
        Arc::new(DiagramService::new(Arc::new(MemoryStore::new())))
    }

    fn diagram() -> DiagramId {
        DiagramId::from("diagram-events")
    }

    async fn next_event(rx: &mut broadcast::Receiver<StoreEvent>) -> StoreEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event should be emitted within 1 second")
            .expect("Should receive event")
    }

    #[tokio::test]
    async fn test_create_node_emits_inserted_event() -> Result<()> {
        let service = create_test_service();
        let mut rx = service.subscribe_to_events();

        service
            .create_node(&diagram(), CreateNodeParams::new("n1", XYPosition::default()))
            .await?;

        match next_event(&mut rx).await {
            StoreEvent::NodeInserted(record) => {
                assert_eq!(record.node.id, "n1");
                assert_eq!(record.diagram_id, diagram());
            }
            other => panic!("Expected NodeInserted event, got {:?}", other),
        }
        assert!(rx.try_recv().is_err(), "exactly one event per write");

        Ok(())
    }

    #[tokio::test]
    async fn test_lazy_aggregate_emits_aggregate_then_node_patch() -> Result<()> {
        let service = create_test_service();
        service
            .create_node(&diagram(), CreateNodeParams::new("n1", XYPosition::default()))
            .await?;
        let mut rx = service.subscribe_to_events();

        service
            .write_node_aggregate(&diagram(), "n1", AggregateWrite::Set(7))
            .await?;

        // The aggregate exists before the node is linked to it
        let first = next_event(&mut rx).await;
        let second = next_event(&mut rx).await;
        assert_eq!(first.collection(), Collection::Aggregates);
        match second {
            StoreEvent::NodePatched(record) => assert!(record.node.data.aggregate.is_some()),
            other => panic!("Expected NodePatched event, got {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_edge_emits_nothing() -> Result<()> {
        let service = create_test_service();
        let mut rx = service.subscribe_to_events();

        let outcome = service
            .apply_edge_changes(
                &diagram(),
                vec![EdgeChange::Add {
                    item: FlowEdge::new("e1", "ghost-a", "ghost-b"),
                }],
            )
            .await?;

        assert_eq!(outcome.rejected.len(), 1);
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));

        Ok(())
    }

    #[tokio::test]
    async fn test_skipped_connect_emits_nothing() -> Result<()> {
        let service = create_test_service();
        service
            .apply_node_changes(
                &diagram(),
                vec![
                    NodeChange::Add {
                        item: FlowNode::new("a", XYPosition::default()),
                    },
                    NodeChange::Add {
                        item: FlowNode::new("b", XYPosition::default()),
                    },
                ],
            )
            .await?;
        service.connect(&diagram(), Connection::new("a", "b")).await?;

        let mut rx = service.subscribe_to_events();
        service.connect(&diagram(), Connection::new("a", "b")).await?;
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));

        Ok(())
    }

    #[tokio::test]
    async fn test_live_node_query_refreshes_on_writes() -> Result<()> {
        let service = create_test_service();
        let mut nodes = LiveQuery::nodes(service.clone(), diagram());

        let initial = timeout(Duration::from_secs(1), nodes.next()).await?.expect("initial listing")?;
        assert!(initial.is_empty());

        service
            .create_node(
                &diagram(),
                CreateNodeParams::new("n1", XYPosition::default()).with_count(3),
            )
            .await?;

        // Aggregate insert and node insert each trigger a refresh; the last
        // one sees the joined count
        let mut latest = Vec::new();
        for _ in 0..2 {
            latest = timeout(Duration::from_secs(1), nodes.next()).await?.expect("refresh")?;
        }
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].data.count, Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn test_live_query_ignores_other_diagrams_and_collections() -> Result<()> {
        let service = create_test_service();
        let mut edges = LiveQuery::edges(service.clone(), diagram());
        timeout(Duration::from_secs(1), edges.next()).await?.expect("initial listing")?;

        // Node writes here and anything in another diagram are not edge changes
        service
            .create_node(&diagram(), CreateNodeParams::new("n1", XYPosition::default()))
            .await?;
        service
            .create_node(&DiagramId::from("elsewhere"), CreateNodeParams::new("n1", XYPosition::default()))
            .await?;

        let quiet = timeout(Duration::from_millis(100), edges.next()).await;
        assert!(quiet.is_err(), "no refresh expected");

        Ok(())
    }
}
