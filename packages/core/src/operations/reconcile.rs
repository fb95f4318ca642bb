//! Write planning for an applied batch
//!
//! Compares the entities fetched before a batch with the applicator's output
//! and classifies every id as an insert, a patch, a delete, or unchanged.

use crate::operations::apply_changes::FlowEntity;
use std::collections::{HashMap, HashSet};

/// Store writes needed to move from the fetched entities to the applied ones
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<E> {
    /// Not previously stored
    pub inserts: Vec<E>,
    /// Previously stored and modified by the batch
    pub patches: Vec<E>,
    /// Previously stored and absent from the result
    pub deletes: Vec<String>,
    /// Previously stored and identical after the batch
    pub unchanged: Vec<String>,
}

impl<E> Reconciliation<E> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.patches.is_empty() && self.deletes.is_empty()
    }
}

pub fn reconcile<E: FlowEntity + PartialEq>(prior: &[E], next: Vec<E>) -> Reconciliation<E> {
    let before: HashMap<&str, &E> = prior.iter().map(|e| (e.entity_id(), e)).collect();
    let after: HashSet<String> = next.iter().map(|e| e.entity_id().to_string()).collect();

    let mut plan = Reconciliation {
        inserts: Vec::new(),
        patches: Vec::new(),
        deletes: Vec::new(),
        unchanged: Vec::new(),
    };

    for entity in next {
        match before.get(entity.entity_id()) {
            None => plan.inserts.push(entity),
            Some(old) if **old == entity => plan.unchanged.push(entity.entity_id().to_string()),
            Some(_) => plan.patches.push(entity),
        }
    }

    plan.deletes = prior
        .iter()
        .map(|e| e.entity_id())
        .filter(|id| !after.contains(*id))
        .map(str::to_string)
        .collect();

    plan
}
