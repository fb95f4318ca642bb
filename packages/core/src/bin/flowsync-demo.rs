//! FlowSync Demo Binary
//!
//! Runs a scripted two-user editing session against an in-memory store and
//! prints the resulting diagram as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin flowsync-demo
//!
//! # Pick the diagram and log level
//! FLOWSYNC_DIAGRAM_ID=team-board RUST_LOG=debug cargo run --bin flowsync-demo
//! ```
//!
//! # Environment Variables
//!
//! - `FLOWSYNC_DIAGRAM_ID`: Diagram to open (default: fresh `diagram-<uuid>`)
//! - `FLOWSYNC_EVENT_CAPACITY`: Store event channel capacity (default: 128)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::sync::Arc;

use flowsync_core::client::DiagramSession;
use flowsync_core::config::SessionConfig;
use flowsync_core::db::MemoryStore;
use flowsync_core::models::{AggregateWrite, Connection, NodeChange, XYPosition};
use flowsync_core::services::{CreateNodeParams, DiagramService, LiveQuery};
use futures::StreamExt;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SessionConfig::from_env()?.install()?.clone();
    tracing::info!("Diagram: {}", config.diagram_id);

    let store = Arc::new(MemoryStore::with_event_capacity(config.event_channel_capacity));
    let service = Arc::new(DiagramService::new(store));

    // Observer printing node counts as the diagram changes
    let mut live_nodes = LiveQuery::nodes(service.clone(), config.diagram_id.clone());
    let observer = tokio::spawn(async move {
        while let Some(listing) = live_nodes.next().await {
            match listing {
                Ok(nodes) => tracing::info!("Live view: {} nodes", nodes.len()),
                Err(err) => tracing::warn!("Live view refresh failed: {}", err),
            }
        }
    });

    let mut alice = DiagramSession::load(config.clone(), service.clone()).await?;
    let mut bob = DiagramSession::load(config.clone(), service.clone()).await?;

    // Alice lays out a root and a child connected to it
    alice
        .create_node(CreateNodeParams::new("root", XYPosition::new(0.0, 0.0)).with_count(1))
        .await?;
    alice
        .create_node(
            CreateNodeParams::new("child", XYPosition::new(0.0, 120.0))
                .with_count(0)
                .connected_from("root", "bottom"),
        )
        .await?;

    // Bob joins, drags the child and connects it back twice (second is a no-op)
    bob.refresh().await?;
    let drag = bob.stage_node_changes(vec![NodeChange::moved("child", XYPosition::new(80.0, 140.0))]);
    bob.commit_node_changes(drag).await?;
    for _ in 0..2 {
        let connect = bob.stage_connection(Connection::new("child", "root").with_handles(Some("right"), Some("left")));
        bob.commit_connection(connect).await?;
    }

    // Both bump the child's counter
    let bump = alice.stage_aggregate("child", AggregateWrite::Add(2));
    alice.commit_aggregate(bump).await?;
    bob.refresh().await?;
    let bump = bob.stage_aggregate("child", AggregateWrite::Add(3));
    let child_count = bob.commit_aggregate(bump).await?;
    tracing::info!("Child counter: {}", child_count);

    // An edge to a node nobody created is rejected and rolled back
    let dangling = bob.stage_connection(Connection::new("child", "ghost"));
    if let Err(err) = bob.commit_connection(dangling).await {
        tracing::info!("Rejected as expected: {}", err);
    }

    alice.refresh().await?;
    let graph = json!({
        "diagramId": config.diagram_id,
        "nodes": alice.nodes(),
        "edges": alice.edges(),
    });
    println!("{}", serde_json::to_string_pretty(&graph)?);

    observer.abort();
    Ok(())
}
