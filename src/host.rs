//! What a controller sees of the host while handling a callback.

use crate::graph::{Graph, Node, NodeId};
use crate::reconciler::PortEditor;
use crate::resolver::RelayClassifier;
use crate::scheduler::TimerQueue;
use crate::settings::Settings;
use crate::width::WidthStabilizer;

/// Redraw bookkeeping. Every graph mutation marks the canvas dirty; the host
/// clears the flag when it draws a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Canvas {
    dirty: bool,
    redraws: u64,
}

impl Canvas {
    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, counting a redraw if it was set.
    pub fn take_dirty(&mut self) -> bool {
        if self.dirty {
            self.dirty = false;
            self.redraws += 1;
            true
        } else {
            false
        }
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }
}

/// A user-visible message raised by a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub node: NodeId,
    pub message: String,
}

/// Host services handed to a controller callback.
///
/// The graph reference is resolved once by the session; controllers never
/// reach for ambient state.
pub struct HostContext<'a> {
    /// The controller's own node.
    pub node: NodeId,
    pub graph: &'a mut Graph,
    pub timers: &'a mut TimerQueue,
    pub canvas: &'a mut Canvas,
    pub notices: &'a mut Vec<Notice>,
    pub settings: &'a Settings,
    pub classifier: &'a RelayClassifier,
    /// Set while the node is being rebuilt from a saved document. Saved modes
    /// win over rules applied on creation.
    pub restoring: bool,
}

impl<'a> HostContext<'a> {
    pub fn node(&self) -> Option<&Node> {
        self.graph.node(self.node)
    }

    pub fn node_mut(&mut self) -> Option<&mut Node> {
        self.graph.node_mut(self.node)
    }

    pub fn mark_dirty(&mut self) {
        self.canvas.set_dirty();
    }

    /// Queues a message for the user.
    pub fn notify(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            node: self.node,
            message: message.into(),
        });
    }

    /// Port editor for the controller's node, routed through its width override.
    pub fn editor<'c>(&'c mut self, width: &'c mut WidthStabilizer) -> PortEditor<'c> {
        PortEditor::new(self.graph, self.timers, width, self.node)
    }
}
