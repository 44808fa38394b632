//! Resolution of the effective data source behind an input port.
//!
//! Relay nodes (reroutes, primitive pass-throughs) only forward data, so a
//! controller cares about whatever sits behind a chain of them. The walk is
//! bounded by a visited set and never fails: dangling links simply end it.

use crate::graph::{GraphAccessor, Link, Node, NodeId};
use ahash::AHashSet;

/// Classifies nodes as transparent relays by substring match on their type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayClassifier {
    patterns: Vec<String>,
}

impl Default for RelayClassifier {
    fn default() -> Self {
        Self::new(["Reroute", "PrimitiveNode"])
    }
}

impl RelayClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_relay(&self, node: &Node) -> bool {
        self.patterns.iter().any(|p| node.type_tag.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// How the resolved node was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The walk ended on a non-relay node.
    Producer,
    /// The relay chain was broken (missing link or node); the last relay reached is returned.
    DeadEndRelay,
    /// The next relay in the chain had already been visited; the walk stopped before looping.
    CycleRelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSource {
    pub node: NodeId,
    pub resolution: Resolution,
}

/// Resolves the upstream source of `node.inputs[input_index]`.
///
/// Returns zero or one node. A broken relay chain still yields the last relay
/// reached, which downstream code treats as the source.
pub fn resolve_source(
    graph: GraphAccessor<'_>,
    classifier: &RelayClassifier,
    node_id: NodeId,
    input_index: usize,
) -> Vec<NodeId> {
    resolve_source_detailed(graph, classifier, node_id, input_index)
        .map(|resolved| vec![resolved.node])
        .unwrap_or_default()
}

/// Like [`resolve_source`], but reports how the walk ended.
pub fn resolve_source_detailed(
    graph: GraphAccessor<'_>,
    classifier: &RelayClassifier,
    node_id: NodeId,
    input_index: usize,
) -> Option<ResolvedSource> {
    let node = graph.node_by_id(node_id)?;
    let link = graph.resolve_link(node.inputs.get(input_index)?)?;
    let mut current = graph.node_by_id(link.origin_id)?;

    let mut visited = AHashSet::new();
    while classifier.is_relay(current) {
        visited.insert(current.id);
        let next = current
            .inputs
            .first()
            .and_then(|slot| graph.resolve_link(slot))
            .and_then(|link| graph.node_by_id(link.origin_id));
        match next {
            None => {
                return Some(ResolvedSource {
                    node: current.id,
                    resolution: Resolution::DeadEndRelay,
                });
            }
            Some(next) if visited.contains(&next.id) => {
                return Some(ResolvedSource {
                    node: current.id,
                    resolution: Resolution::CycleRelay,
                });
            }
            Some(next) => current = next,
        }
    }

    Some(ResolvedSource {
        node: current.id,
        resolution: Resolution::Producer,
    })
}

/// The first downstream endpoint of an output port: the link and the node it feeds.
pub fn first_target<'a>(
    graph: GraphAccessor<'a>,
    node_id: NodeId,
    output_index: usize,
) -> Option<(&'a Link, &'a Node)> {
    let node = graph.node_by_id(node_id)?;
    let output = node.outputs.get(output_index)?;
    output.links.iter().find_map(|link_id| {
        let link = graph.link(*link_id)?;
        let target = graph.node_by_id(link.target_id)?;
        Some((link, target))
    })
}
