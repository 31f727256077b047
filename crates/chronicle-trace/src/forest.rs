//! Execution tree reconstruction.

use chronicle_types::AuditEvent;
use serde::Serialize;
use std::collections::HashMap;

/// One node of a reconstructed execution tree.
#[derive(Debug, Clone, Serialize)]
pub struct TraceNode {
    /// The event at this node.
    pub event: AuditEvent,
    /// Child events, ordered by timestamp.
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    /// Total nodes in this subtree, including self.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TraceNode::size).sum::<usize>()
    }
}

/// Build an execution forest from a flat event set.
///
/// Two passes: an id → index map, then child attachment. Events whose
/// `parent_event_id` is absent from the set (orphans whose parent may not be
/// durable yet) become roots instead of being dropped. Self-references and
/// cycles are broken by promoting the unreached events to roots, so every
/// input event appears in the output exactly once.
pub fn build_forest(events: Vec<AuditEvent>) -> Vec<TraceNode> {
    let index_of: HashMap<_, _> = events
        .iter()
        .enumerate()
        .map(|(index, event)| (event.id, index))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); events.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (index, event) in events.iter().enumerate() {
        match event
            .context
            .parent_event_id
            .and_then(|parent| index_of.get(&parent))
        {
            Some(&parent_index) if parent_index != index => {
                children[parent_index].push(index)
            }
            _ => roots.push(index),
        }
    }

    let mut slots: Vec<Option<AuditEvent>> = events.into_iter().map(Some).collect();
    let mut forest: Vec<TraceNode> = roots
        .into_iter()
        .filter_map(|root| attach(root, &children, &mut slots))
        .collect();

    // Anything still unattached sits on a cycle; surface it as a root
    // rather than losing it.
    for index in 0..slots.len() {
        if slots[index].is_some() {
            if let Some(node) = attach(index, &children, &mut slots) {
                forest.push(node);
            }
        }
    }

    forest.sort_by(|a, b| a.event.timestamp.cmp(&b.event.timestamp));
    forest
}

fn attach(
    index: usize,
    children: &[Vec<usize>],
    slots: &mut Vec<Option<AuditEvent>>,
) -> Option<TraceNode> {
    let event = slots[index].take()?;
    let mut node = TraceNode {
        event,
        children: Vec::new(),
    };
    for &child in &children[index] {
        if let Some(child_node) = attach(child, children, slots) {
            node.children.push(child_node);
        }
    }
    node.children
        .sort_by(|a, b| a.event.timestamp.cmp(&b.event.timestamp));
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::{Actor, EventId, EventType};

    fn event(parent: Option<EventId>) -> AuditEvent {
        let mut builder = AuditEvent::builder(
            EventType::parse("agent.node.completed").unwrap(),
            Actor::agent("planner-1"),
        )
        .tenant("acme")
        .request_id("req-1");
        if let Some(parent) = parent {
            builder = builder.parent(parent);
        }
        builder.build()
    }

    fn count(forest: &[TraceNode]) -> usize {
        forest.iter().map(TraceNode::size).sum()
    }

    #[test]
    fn test_single_chain() {
        let root = event(None);
        let child = event(Some(root.id));
        let grandchild = event(Some(child.id));

        let forest = build_forest(vec![grandchild.clone(), root.clone(), child.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].event.id, root.id);
        assert_eq!(forest[0].children[0].event.id, child.id);
        assert_eq!(forest[0].children[0].children[0].event.id, grandchild.id);
    }

    #[test]
    fn test_orphan_becomes_root() {
        let root = event(None);
        let orphan = event(Some(EventId::new()));

        let forest = build_forest(vec![root.clone(), orphan.clone()]);
        assert_eq!(forest.len(), 2);
        assert_eq!(count(&forest), 2);
    }

    #[test]
    fn test_children_ordered_by_timestamp() {
        let root = event(None);
        let mut late = event(Some(root.id));
        let mut early = event(Some(root.id));
        late.timestamp = root.timestamp + chrono::Duration::seconds(10);
        early.timestamp = root.timestamp + chrono::Duration::seconds(1);

        let forest = build_forest(vec![root.clone(), late.clone(), early.clone()]);
        assert_eq!(forest[0].children[0].event.id, early.id);
        assert_eq!(forest[0].children[1].event.id, late.id);
    }

    #[test]
    fn test_cycle_does_not_lose_events() {
        let mut a = event(None);
        let b = event(Some(a.id));
        a.context.parent_event_id = Some(b.id);

        let forest = build_forest(vec![a, b]);
        assert_eq!(count(&forest), 2);
    }

    #[test]
    fn test_empty_set() {
        assert!(build_forest(Vec::new()).is_empty());
    }
}
