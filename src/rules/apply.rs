use crate::graph::{Graph, Mode, Node, NodeId};
use crate::resolver::{RelayClassifier, resolve_source};
use ahash::AHashSet;

/// Nodes whose mode a rule application wrote, split by the mode written.
///
/// Nodes already in the requested mode are listed too; `changed` counts only
/// the writes that flipped a mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub activated: Vec<NodeId>,
    pub bypassed: Vec<NodeId>,
    pub changed: usize,
}

impl ApplyOutcome {
    fn record(&mut self, id: NodeId, mode: Mode, changed: bool) {
        match mode {
            Mode::Active => self.activated.push(id),
            Mode::Bypassed => self.bypassed.push(id),
        }
        if changed {
            self.changed += 1;
        }
    }

    pub fn touched(&self) -> usize {
        self.activated.len() + self.bypassed.len()
    }
}

/// Activates every node inside a group whose title is listed and bypasses
/// every node inside the other groups.
///
/// Membership is recomputed from geometry on every call. A node inside two
/// groups ends up with the mode of the last group in z-order.
pub fn apply_group_rule(graph: &mut Graph, active_titles: &[String]) -> ApplyOutcome {
    let plan: Vec<(NodeId, Mode)> = {
        let accessor = graph.accessor();
        accessor
            .all_groups()
            .iter()
            .flat_map(|group| {
                let mode = Mode::from_active(active_titles.contains(&group.title));
                accessor.nodes_in(group).into_iter().map(move |node| (node.id, mode))
            })
            .collect()
    };

    let mut outcome = ApplyOutcome::default();
    for (id, mode) in plan {
        let changed = graph.set_mode(id, mode);
        outcome.record(id, mode, changed);
    }
    outcome
}

/// Sets every node inside the group titled `title`. Returns `None` if no such group exists.
pub fn apply_group_toggle(graph: &mut Graph, title: &str, on: bool) -> Option<ApplyOutcome> {
    let members: Vec<NodeId> = {
        let accessor = graph.accessor();
        let group = accessor.all_groups().iter().find(|g| g.title == title)?;
        accessor.nodes_in(group).iter().map(|n| n.id).collect()
    };
    let mut outcome = ApplyOutcome::default();
    set_nodes_mode(graph, &members, Mode::from_active(on), &mut outcome);
    Some(outcome)
}

/// Resolved sources of every connected input of `controller`, excluding the
/// always-open trailing input. Pairs carry the 1-based slot index.
pub fn connected_sources(
    graph: &Graph,
    classifier: &RelayClassifier,
    controller: NodeId,
) -> Vec<(i64, NodeId)> {
    let Some(node) = graph.node(controller) else {
        return Vec::new();
    };
    let accessor = graph.accessor();
    let covered = node.inputs.len().saturating_sub(1);
    node.inputs[..covered]
        .iter()
        .enumerate()
        .filter(|(_, input)| input.is_connected())
        .flat_map(|(slot, _)| {
            resolve_source(accessor, classifier, controller, slot)
                .into_iter()
                .map(move |source| (slot as i64 + 1, source))
        })
        .collect()
}

/// Activates the sources of the listed 1-based slots and bypasses the sources
/// of every other connected slot. Container sources propagate to their nested nodes.
pub fn apply_index_rule(
    graph: &mut Graph,
    classifier: &RelayClassifier,
    controller: NodeId,
    active_slots: &[i64],
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for (slot, source) in connected_sources(graph, classifier, controller) {
        let mode = Mode::from_active(active_slots.contains(&slot));
        set_nodes_mode(graph, &[source], mode, &mut outcome);
    }
    outcome
}

/// Sets every resolved source of `controller` to Active (`on`) or Bypassed.
pub fn apply_toggle(
    graph: &mut Graph,
    classifier: &RelayClassifier,
    controller: NodeId,
    on: bool,
) -> ApplyOutcome {
    let sources: Vec<NodeId> = connected_sources(graph, classifier, controller)
        .into_iter()
        .map(|(_, source)| source)
        .collect();
    let mut outcome = ApplyOutcome::default();
    set_nodes_mode(graph, &sources, Mode::from_active(on), &mut outcome);
    outcome
}

/// The toggle state to display given the sources' current modes.
///
/// No sources or all Active shows on, all Bypassed shows off. A mixture keeps
/// `current` so a partial external edit does not flip the toggle back and forth.
pub fn toggle_display(
    graph: &Graph,
    classifier: &RelayClassifier,
    controller: NodeId,
    current: bool,
) -> bool {
    let modes: Vec<Mode> = connected_sources(graph, classifier, controller)
        .into_iter()
        .filter_map(|(_, source)| graph.node(source).map(|n| n.mode))
        .collect();
    if modes.iter().all(|m| *m == Mode::Active) {
        true
    } else if modes.iter().all(|m| *m == Mode::Bypassed) {
        false
    } else {
        current
    }
}

/// Sets `mode` on each root and, transitively, on every node nested in its subgraph.
///
/// The walk uses an explicit stack. Each subgraph is its own id space, so the
/// visited set is keyed by (subgraph, id): a root listed twice or a repeated id
/// among siblings is written once, while nested ids never shadow outer ones.
pub fn set_nodes_mode(graph: &mut Graph, roots: &[NodeId], mode: Mode, outcome: &mut ApplyOutcome) {
    let mut visited: AHashSet<(usize, NodeId)> = AHashSet::new();
    let mut next_scope = 1;
    for &root in roots {
        if !visited.insert((0, root)) {
            continue;
        }
        let Some(node) = graph.node_mut(root) else {
            continue;
        };
        let changed = node.set_mode(mode);
        outcome.record(root, mode, changed);

        let mut stack: Vec<(usize, &mut Node)> = Vec::new();
        if let Some(subgraph) = node.subgraph.as_mut() {
            let scope = next_scope;
            next_scope += 1;
            stack.extend(subgraph.nodes.iter_mut().rev().map(|n| (scope, n)));
        }
        while let Some((scope, nested)) = stack.pop() {
            if !visited.insert((scope, nested.id)) {
                continue;
            }
            let changed = nested.set_mode(mode);
            outcome.record(nested.id, mode, changed);
            if let Some(subgraph) = nested.subgraph.as_mut() {
                let scope = next_scope;
                next_scope += 1;
                stack.extend(subgraph.nodes.iter_mut().rev().map(|n| (scope, n)));
            }
        }
    }
    if outcome.changed > 0 {
        log::debug!("set {} node(s) to {:?}", outcome.changed, mode);
    }
}
