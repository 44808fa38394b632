//! Convergence of a node's dynamic port list to its canonical shape.
//!
//! Every pass is idempotent: running it again on an already canonical node
//! changes nothing. Port additions and removals go through [`PortEditor`], which
//! pins the node width for the duration of a burst of edits.

use crate::graph::{ANY_TYPE, Graph, Node, NodeId};
use crate::scheduler::TimerQueue;
use crate::width::WidthStabilizer;

mod inputs;
mod outputs;

pub use inputs::{FixedSlotLabels, stabilize_fixed_minimum, stabilize_single_growth};
pub use outputs::{ControlSnapshot, OPEN_OUTPUT_LABEL, ReplicatorState, stabilize_outputs};

/// How connected inputs are labelled from their resolved source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// `[<1-based index>] <source title>`
    Indexed,
    /// `<source title>`
    Title,
}

impl LabelStyle {
    pub fn label(self, index: usize, source_title: &str) -> String {
        match self {
            LabelStyle::Indexed => {
                let title = if source_title.is_empty() {
                    "Input"
                } else {
                    source_title
                };
                format!("[{}] {}", index + 1, title)
            }
            LabelStyle::Title if source_title.is_empty() => format!("Input {}", index + 1),
            LabelStyle::Title => source_title.to_string(),
        }
    }
}

/// Summary of what a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub relabeled: usize,
}

impl ReconcileReport {
    pub fn changed_shape(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Port mutation primitives for one node, wrapped with the width override.
pub struct PortEditor<'a> {
    graph: &'a mut Graph,
    timers: &'a mut TimerQueue,
    width: &'a mut WidthStabilizer,
    node: NodeId,
}

impl<'a> PortEditor<'a> {
    pub fn new(
        graph: &'a mut Graph,
        timers: &'a mut TimerQueue,
        width: &'a mut WidthStabilizer,
        node: NodeId,
    ) -> Self {
        Self {
            graph,
            timers,
            width,
            node,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node(&self) -> Option<&Node> {
        self.graph.node(self.node)
    }

    pub fn node_mut(&mut self) -> Option<&mut Node> {
        self.graph.node_mut(self.node)
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    fn hold_width(&mut self) {
        if let Some(width) = self.graph.node(self.node).map(Node::width) {
            self.width.hold(width);
        }
    }

    pub fn add_input(&mut self, name: &str) -> Option<usize> {
        self.hold_width();
        let index = self.graph.add_input(self.node, name, ANY_TYPE);
        self.refresh_size();
        index
    }

    pub fn remove_input(&mut self, slot: usize) -> bool {
        self.hold_width();
        let removed = self.graph.remove_input(self.node, slot).is_some();
        self.refresh_size();
        removed
    }

    pub fn add_output(&mut self, name: &str) -> Option<usize> {
        self.hold_width();
        let index = self.graph.add_output(self.node, name, ANY_TYPE);
        self.refresh_size();
        index
    }

    pub fn remove_output(&mut self, slot: usize) -> bool {
        self.hold_width();
        let removed = self.graph.remove_output(self.node, slot).is_some();
        self.refresh_size();
        removed
    }

    /// Renames an input. Returns `true` if the name changed.
    pub fn set_input_name(&mut self, slot: usize, name: &str) -> bool {
        match self.node_mut().and_then(|n| n.inputs.get_mut(slot)) {
            Some(input) if input.name != name => {
                input.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Renames an output. Returns `true` if the name changed.
    pub fn set_output_name(&mut self, slot: usize, name: &str) -> bool {
        match self.node_mut().and_then(|n| n.outputs.get_mut(slot)) {
            Some(output) if output.name != name => {
                output.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn refresh_size(&mut self) {
        self.width.refresh(self.graph, self.timers, self.node);
    }
}
