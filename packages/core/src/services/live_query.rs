//! Live Queries
//!
//! Turns store write events into a stream of refreshed listings for one
//! diagram. The first item is the current state; every later item follows a
//! write to a collection the listing depends on.
//!
//! A subscriber that lags behind the broadcast channel skips the lost events
//! and simply refreshes, since every item is a full re-read.
//!
//! # Examples
//!
//! ```rust
//! use flowsync_core::db::MemoryStore;
//! use flowsync_core::models::DiagramId;
//! use flowsync_core::services::{DiagramService, LiveQuery};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let service = Arc::new(DiagramService::new(Arc::new(MemoryStore::new())));
//! let mut nodes = LiveQuery::nodes(service, DiagramId::from("diagram-1"));
//! let initial = nodes.next().await;
//! assert_eq!(initial.map(|listing| listing.map(|nodes| nodes.len())), Some(Ok(0)));
//! # }
//! ```

use crate::db::Collection;
use crate::models::{DiagramId, FlowEdge, FlowNode};
use crate::services::diagram_service::DiagramService;
use crate::services::error::DiagramServiceError;
use futures::future::{self, Future};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

pub type Listing<T> = Result<Vec<T>, DiagramServiceError>;

/// Constructors for live listing streams
pub struct LiveQuery;

impl LiveQuery {
    /// Node listings; refreshed on node and aggregate writes
    pub fn nodes(service: Arc<DiagramService>, diagram_id: DiagramId) -> BoxStream<'static, Listing<FlowNode>> {
        Self::watch(
            service,
            diagram_id,
            &[Collection::Nodes, Collection::Aggregates],
            |service, diagram_id| async move { service.list_nodes(&diagram_id).await },
        )
    }

    /// Edge listings; refreshed on edge writes
    pub fn edges(service: Arc<DiagramService>, diagram_id: DiagramId) -> BoxStream<'static, Listing<FlowEdge>> {
        Self::watch(service, diagram_id, &[Collection::Edges], |service, diagram_id| async move {
            service.list_edges(&diagram_id).await
        })
    }

    fn watch<T, F, Fut>(
        service: Arc<DiagramService>,
        diagram_id: DiagramId,
        collections: &'static [Collection],
        read: F,
    ) -> BoxStream<'static, Listing<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<DiagramService>, DiagramId) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Listing<T>> + Send + 'static,
    {
        // Subscribe before the initial read so no write falls in between
        let events = BroadcastStream::new(service.subscribe_to_events());

        let watched = diagram_id.clone();
        let triggers = events.filter(move |event| {
            let relevant = match event {
                Ok(event) => event.diagram_id() == &watched && collections.contains(&event.collection()),
                Err(lagged) => {
                    tracing::debug!("Live query lagged: {}", lagged);
                    true
                }
            };
            future::ready(relevant)
        });

        let initial = stream::once(read(service.clone(), diagram_id.clone()));
        let refreshes = triggers.then(move |_| read(service.clone(), diagram_id.clone()));

        initial.chain(refreshes).boxed()
    }
}
