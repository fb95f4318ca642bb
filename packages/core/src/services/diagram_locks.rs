//! Per-diagram write serialization
//!
//! Every mutation entry point holds its diagram's lock for the whole logical
//! step (fetch, apply, write), so batches on one diagram are serializable
//! while different diagrams proceed concurrently.
//!
//! Entries nobody holds or waits on are pruned whenever a lock is taken, so
//! the table only tracks diagrams with in-flight mutations.

use crate::models::DiagramId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry handing out one async mutex per diagram
#[derive(Debug, Default)]
pub struct DiagramLocks {
    locks: Mutex<HashMap<DiagramId, Arc<Mutex<()>>>>,
}

impl DiagramLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `diagram_id`
    pub async fn lock(&self, diagram_id: &DiagramId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Clones are only handed out under the table lock, so a count of
            // one means no holder and no waiter.
            locks.retain(|id, lock| id == diagram_id || Arc::strong_count(lock) > 1);
            locks.entry(diagram_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked diagrams, idle ones included until the next prune
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
