//! In-memory model of the host editor's graph: nodes with typed ports, links
//! between them, and titled groups.
//!
//! The graph is mutated in place by the session and by controllers. Every
//! port mutation keeps the link table consistent, so any prefix of a
//! reconciliation leaves a valid (if not yet canonical) graph behind.

use indexmap::IndexMap;

mod accessor;
mod geometry;
mod node;
mod widget;

pub use accessor::GraphAccessor;
pub use geometry::{Group, Rect};
pub use node::{InputSlot, Mode, Node, OutputSlot, Subgraph};
pub use widget::{ParamSpec, Widget, WidgetId, WidgetKind};

pub type NodeId = u32;
pub type LinkId = u32;

/// Wildcard type tag accepted by and connectable to every port.
pub const ANY_TYPE: &str = "*";

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub origin_id: NodeId,
    pub origin_slot: usize,
    pub target_id: NodeId,
    pub target_slot: usize,
    pub type_tag: String,
}

/// Result of a successful `Graph::connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub link: LinkId,
    /// The link that previously occupied the target input, if any.
    pub replaced: Option<Link>,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    links: IndexMap<LinkId, Link>,
    groups: Vec<Group>,
    next_node_id: NodeId,
    next_link_id: LinkId,
}

fn types_compatible(output: &str, input: &str) -> bool {
    output == ANY_TYPE
        || input == ANY_TYPE
        || output.is_empty()
        || input.is_empty()
        || output == input
}

impl Graph {
    pub fn new() -> Self {
        Self {
            next_node_id: 1,
            next_link_id: 1,
            ..Default::default()
        }
    }

    pub fn accessor(&self) -> GraphAccessor<'_> {
        GraphAccessor::new(Some(self))
    }

    // --- Nodes ---

    /// Adds a node under a freshly assigned id.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_node_id.max(1);
        self.next_node_id = id + 1;
        node.id = id;
        self.nodes.insert(id, node);
        id
    }

    /// Inserts a node under its own id. Returns `false` if the id is taken.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.next_node_id = self.next_node_id.max(node.id + 1);
        self.nodes.insert(node.id, node);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Removes a node and every link touching it. Returns the node and the removed links.
    pub fn remove_node(&mut self, id: NodeId) -> Option<(Node, Vec<Link>)> {
        let touching: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.origin_id == id || l.target_id == id)
            .map(|l| l.id)
            .collect();
        let removed = touching
            .into_iter()
            .filter_map(|link_id| self.remove_link(link_id))
            .collect();
        let node = self.nodes.shift_remove(&id)?;
        Some((node, removed))
    }

    /// Sets a node's mode. Returns `true` if the mode actually changed.
    pub fn set_mode(&mut self, id: NodeId, mode: Mode) -> bool {
        self.nodes.get_mut(&id).is_some_and(|node| node.set_mode(mode))
    }

    /// Highest node id handed out so far.
    pub fn last_node_id(&self) -> NodeId {
        self.next_node_id.saturating_sub(1)
    }

    /// Highest link id handed out so far.
    pub fn last_link_id(&self) -> LinkId {
        self.next_link_id.saturating_sub(1)
    }

    /// Raises the id counters so fresh ids never collide with saved ones.
    pub fn reserve_ids(&mut self, last_node_id: NodeId, last_link_id: LinkId) {
        self.next_node_id = self.next_node_id.max(last_node_id.saturating_add(1));
        self.next_link_id = self.next_link_id.max(last_link_id.saturating_add(1));
    }

    // --- Groups ---

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }

    // --- Links ---

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Connects `origin.outputs[origin_slot]` to `target.inputs[target_slot]`.
    ///
    /// An existing link on the target input is replaced. Returns `None` when an
    /// endpoint is missing or the port types are incompatible.
    pub fn connect(
        &mut self,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Option<Connection> {
        let output_type = self
            .nodes
            .get(&origin_id)?
            .outputs
            .get(origin_slot)?
            .type_tag
            .clone();
        let input = self.nodes.get(&target_id)?.inputs.get(target_slot)?;
        if !types_compatible(&output_type, &input.type_tag) {
            return None;
        }
        let previous = input.link;

        let replaced = previous.and_then(|link_id| self.remove_link(link_id));
        let id = self.next_link_id.max(1);
        self.next_link_id = id + 1;
        self.attach(Link {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            type_tag: output_type,
        });
        Some(Connection { link: id, replaced })
    }

    /// Restores a link under its own id, as read from a saved document.
    /// Returns `false` if the id is taken or an endpoint port does not exist.
    pub fn insert_link(&mut self, link: Link) -> bool {
        if self.links.contains_key(&link.id) {
            return false;
        }
        let origin_ok = self
            .nodes
            .get(&link.origin_id)
            .is_some_and(|n| link.origin_slot < n.outputs.len());
        let target_ok = self
            .nodes
            .get(&link.target_id)
            .is_some_and(|n| link.target_slot < n.inputs.len());
        if !origin_ok || !target_ok {
            return false;
        }
        if let Some(previous) = self.nodes[&link.target_id].inputs[link.target_slot].link {
            self.remove_link(previous);
        }
        self.next_link_id = self.next_link_id.max(link.id + 1);
        self.attach(link);
        true
    }

    fn attach(&mut self, link: Link) {
        if let Some(origin) = self.nodes.get_mut(&link.origin_id) {
            if let Some(output) = origin.outputs.get_mut(link.origin_slot) {
                output.links.push(link.id);
            }
        }
        if let Some(target) = self.nodes.get_mut(&link.target_id) {
            if let Some(input) = target.inputs.get_mut(link.target_slot) {
                input.link = Some(link.id);
            }
        }
        self.links.insert(link.id, link);
    }

    /// Removes a link and clears both port references to it.
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&id)?;
        if let Some(origin) = self.nodes.get_mut(&link.origin_id) {
            if let Some(output) = origin.outputs.get_mut(link.origin_slot) {
                output.links.retain(|l| *l != id);
            }
        }
        if let Some(target) = self.nodes.get_mut(&link.target_id) {
            if let Some(input) = target.inputs.get_mut(link.target_slot) {
                if input.link == Some(id) {
                    input.link = None;
                }
            }
        }
        Some(link)
    }

    // --- Port primitives ---

    /// Appends an input port. Returns its index.
    pub fn add_input(&mut self, node_id: NodeId, name: &str, type_tag: &str) -> Option<usize> {
        let node = self.nodes.get_mut(&node_id)?;
        node.inputs.push(InputSlot::new(name, type_tag));
        Some(node.inputs.len() - 1)
    }

    /// Removes an input port, dropping its link and renumbering the links of later inputs.
    pub fn remove_input(&mut self, node_id: NodeId, slot: usize) -> Option<InputSlot> {
        let link = self.nodes.get(&node_id)?.inputs.get(slot)?.link;
        if let Some(link_id) = link {
            self.remove_link(link_id);
        }
        let node = self.nodes.get_mut(&node_id)?;
        let removed = node.inputs.remove(slot);
        let shifted: Vec<LinkId> = node.inputs[slot..]
            .iter()
            .filter_map(|input| input.link)
            .collect();
        for link_id in shifted {
            if let Some(link) = self.links.get_mut(&link_id) {
                link.target_slot -= 1;
            }
        }
        Some(removed)
    }

    /// Appends an output port. Returns its index.
    pub fn add_output(&mut self, node_id: NodeId, name: &str, type_tag: &str) -> Option<usize> {
        let node = self.nodes.get_mut(&node_id)?;
        node.outputs.push(OutputSlot::new(name, type_tag));
        Some(node.outputs.len() - 1)
    }

    /// Removes an output port, dropping its links and renumbering the links of later outputs.
    pub fn remove_output(&mut self, node_id: NodeId, slot: usize) -> Option<OutputSlot> {
        let links = self.nodes.get(&node_id)?.outputs.get(slot)?.links.clone();
        for link_id in links {
            self.remove_link(link_id);
        }
        let node = self.nodes.get_mut(&node_id)?;
        let removed = node.outputs.remove(slot);
        let shifted: Vec<LinkId> = node.outputs[slot..]
            .iter()
            .flat_map(|output| output.links.iter().copied())
            .collect();
        for link_id in shifted {
            if let Some(link) = self.links.get_mut(&link_id) {
                link.origin_slot -= 1;
            }
        }
        Some(removed)
    }
}
