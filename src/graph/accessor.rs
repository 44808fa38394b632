use super::{Graph, Group, InputSlot, Link, LinkId, Node, NodeId};

/// Read-only queries over the live graph.
///
/// The accessor tolerates an absent graph: every query then returns an empty
/// result instead of failing, since controllers may be asked to work before
/// they are attached to a graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphAccessor<'a> {
    graph: Option<&'a Graph>,
}

impl<'a> GraphAccessor<'a> {
    pub fn new(graph: Option<&'a Graph>) -> Self {
        Self { graph }
    }

    pub fn all_groups(&self) -> &'a [Group] {
        self.graph.map(Graph::groups).unwrap_or(&[])
    }

    pub fn group_titles(&self) -> Vec<String> {
        self.all_groups().iter().map(|g| g.title.clone()).collect()
    }

    /// Nodes whose center lies inside the group rectangle, in graph order.
    pub fn nodes_in(&self, group: &Group) -> Vec<&'a Node> {
        match self.graph {
            Some(graph) => graph
                .nodes()
                .filter(|node| group.bounding.contains(node.center()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The link feeding an input slot, if both the reference and the link exist.
    pub fn resolve_link(&self, slot: &InputSlot) -> Option<&'a Link> {
        let graph = self.graph?;
        graph.link(slot.link?)
    }

    pub fn link(&self, id: LinkId) -> Option<&'a Link> {
        self.graph?.link(id)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&'a Node> {
        self.graph?.node(id)
    }
}
