//! Change Applicator
//!
//! Pure application of a change batch to an entity list. The same functions run
//! on the authoritative mutation path ([`crate::services::DiagramService`]) and
//! on the client prediction path ([`crate::client::OptimisticView`]), so both
//! sides always agree on the effect of a batch.
//!
//! # Semantics
//!
//! Application runs in two passes over the batch:
//!
//! 1. **Membership**: `add` and `reset` in batch order. Both replace an entity
//!    with the same id in place (last wins) or append the item.
//! 2. **Updates**: `remove`, `select`, `position` and `dimensions` in batch
//!    order against the membership produced by pass 1. Unknown ids are no-ops.
//!
//! Output preserves the order of surviving prior entities, followed by appended
//! items in batch order.

use crate::models::{EdgeChange, FlowEdge, FlowNode, NodeChange};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Anything that lives in a diagram list under a domain id
pub trait FlowEntity: Clone {
    fn entity_id(&self) -> &str;
}

impl FlowEntity for FlowNode {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl FlowEntity for FlowEdge {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// What a change does to list membership
#[derive(Debug, Clone, Copy)]
pub enum ChangeTarget<'a, E> {
    Add(&'a E),
    Reset(&'a E),
    Remove(&'a str),
    Update(&'a str),
}

/// A change operation the applicator understands
pub trait EntityChange {
    type Entity: FlowEntity;

    fn target(&self) -> ChangeTarget<'_, Self::Entity>;

    /// Apply a field update; only called for [`ChangeTarget::Update`]
    fn apply_update(&self, entity: &mut Self::Entity);

    /// Domain id this change refers to
    fn entity_id(&self) -> &str {
        match self.target() {
            ChangeTarget::Add(item) | ChangeTarget::Reset(item) => item.entity_id(),
            ChangeTarget::Remove(id) | ChangeTarget::Update(id) => id,
        }
    }
}

impl EntityChange for NodeChange {
    type Entity = FlowNode;

    fn target(&self) -> ChangeTarget<'_, FlowNode> {
        match self {
            NodeChange::Add { item } => ChangeTarget::Add(item),
            NodeChange::Reset { item } => ChangeTarget::Reset(item),
            NodeChange::Remove { id } => ChangeTarget::Remove(id),
            NodeChange::Select { id, .. }
            | NodeChange::Position { id, .. }
            | NodeChange::Dimensions { id, .. }
            | NodeChange::Count { id, .. } => ChangeTarget::Update(id),
        }
    }

    fn apply_update(&self, node: &mut FlowNode) {
        match self {
            NodeChange::Select { selected, .. } => node.selected = Some(*selected),
            NodeChange::Position {
                position,
                position_absolute,
                dragging,
                ..
            } => {
                if let Some(position) = position {
                    node.position = *position;
                }
                if let Some(absolute) = position_absolute {
                    node.position_absolute = Some(*absolute);
                }
                if let Some(dragging) = dragging {
                    node.dragging = Some(*dragging);
                }
            }
            NodeChange::Dimensions {
                dimensions,
                update_style,
                resizing,
                ..
            } => {
                if let Some(dimensions) = dimensions {
                    node.width = Some(dimensions.width);
                    node.height = Some(dimensions.height);
                    if *update_style == Some(true) {
                        merge_size_into_style(node, dimensions.width, dimensions.height);
                    }
                }
                if let Some(resizing) = resizing {
                    node.resizing = Some(*resizing);
                }
            }
            NodeChange::Count { write, .. } => {
                node.data.count = Some(write.apply_to(node.data.count.unwrap_or(0)));
            }
            NodeChange::Add { .. } | NodeChange::Reset { .. } | NodeChange::Remove { .. } => {}
        }
    }
}

impl EntityChange for EdgeChange {
    type Entity = FlowEdge;

    fn target(&self) -> ChangeTarget<'_, FlowEdge> {
        match self {
            EdgeChange::Add { item } => ChangeTarget::Add(item),
            EdgeChange::Reset { item } => ChangeTarget::Reset(item),
            EdgeChange::Remove { id } => ChangeTarget::Remove(id),
            EdgeChange::Select { id, .. } => ChangeTarget::Update(id),
        }
    }

    fn apply_update(&self, edge: &mut FlowEdge) {
        if let EdgeChange::Select { selected, .. } = self {
            edge.selected = Some(*selected);
        }
    }
}

fn merge_size_into_style(node: &mut FlowNode, width: f64, height: f64) {
    let mut style = match node.style.take() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    style.insert("width".to_string(), Value::from(width));
    style.insert("height".to_string(), Value::from(height));
    node.style = Some(Value::Object(style));
}

/// Apply `changes` to `prior` and return the next entity list
pub fn apply_changes<C: EntityChange>(changes: &[C], prior: &[C::Entity]) -> Vec<C::Entity> {
    let mut slots: Vec<Option<C::Entity>> = prior.iter().cloned().map(Some).collect();
    let mut index: HashMap<String, usize> = prior
        .iter()
        .enumerate()
        .map(|(i, entity)| (entity.entity_id().to_string(), i))
        .collect();

    for change in changes {
        match change.target() {
            ChangeTarget::Add(item) | ChangeTarget::Reset(item) => {
                let existing = index.get(item.entity_id()).copied();
                match existing {
                    Some(slot) => slots[slot] = Some(item.clone()),
                    None => {
                        index.insert(item.entity_id().to_string(), slots.len());
                        slots.push(Some(item.clone()));
                    }
                }
            }
            ChangeTarget::Remove(_) | ChangeTarget::Update(_) => {}
        }
    }

    for change in changes {
        match change.target() {
            ChangeTarget::Remove(id) => {
                if let Some(slot) = index.remove(id) {
                    slots[slot] = None;
                }
            }
            ChangeTarget::Update(id) => {
                if let Some(entity) = index.get(id).and_then(|&slot| slots[slot].as_mut()) {
                    change.apply_update(entity);
                }
            }
            ChangeTarget::Add(_) | ChangeTarget::Reset(_) => {}
        }
    }

    slots.into_iter().flatten().collect()
}

pub fn apply_node_changes(changes: &[NodeChange], nodes: &[FlowNode]) -> Vec<FlowNode> {
    apply_changes(changes, nodes)
}

pub fn apply_edge_changes(changes: &[EdgeChange], edges: &[FlowEdge]) -> Vec<FlowEdge> {
    apply_changes(changes, edges)
}

/// Distinct domain ids referenced by a batch, in first-seen order
pub fn referenced_ids<C: EntityChange>(changes: &[C]) -> Vec<String> {
    let mut seen = HashSet::new();
    changes
        .iter()
        .map(|change| change.entity_id())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Ids that a batch tries to `add` (as opposed to `reset`)
pub fn added_ids<C: EntityChange>(changes: &[C]) -> HashSet<String> {
    changes
        .iter()
        .filter_map(|change| match change.target() {
            ChangeTarget::Add(item) => Some(item.entity_id().to_string()),
            _ => None,
        })
        .collect()
}
