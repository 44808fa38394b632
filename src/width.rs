use crate::graph::{Graph, NodeId};
use crate::scheduler::{TimerKind, TimerQueue, TimerToken};

/// Holds a node's on-screen width steady while its ports are being edited.
///
/// Each port mutation captures the current width as an override. Size
/// computations substitute the override and restart a short decay timer; once
/// the timer fires without interruption the override is released and the node
/// takes its natural size again.
#[derive(Debug, Clone, Default)]
pub struct WidthStabilizer {
    override_width: Option<f32>,
    decay: Option<TimerToken>,
    decay_ms: u64,
}

impl WidthStabilizer {
    pub fn new(decay_ms: u64) -> Self {
        Self {
            override_width: None,
            decay: None,
            decay_ms,
        }
    }

    pub fn override_width(&self) -> Option<f32> {
        self.override_width
    }

    /// Captures `width` as the override ahead of a port mutation.
    pub fn hold(&mut self, width: f32) {
        self.override_width = Some(width);
    }

    /// Wraps the natural size, substituting the held width and restarting the decay.
    pub fn compute_size(
        &mut self,
        natural: [f32; 2],
        timers: &mut TimerQueue,
        owner: NodeId,
    ) -> [f32; 2] {
        match self.override_width {
            Some(width) => {
                if let Some(token) = self.decay.take() {
                    timers.cancel(token);
                }
                self.decay = Some(timers.schedule(owner, TimerKind::WidthDecay, self.decay_ms));
                [width, natural[1]]
            }
            None => natural,
        }
    }

    /// Recomputes and applies the node's size through the override.
    pub fn refresh(&mut self, graph: &mut Graph, timers: &mut TimerQueue, node_id: NodeId) {
        let Some(natural) = graph.node(node_id).map(|n| n.natural_size()) else {
            return;
        };
        let size = self.compute_size(natural, timers, node_id);
        if let Some(node) = graph.node_mut(node_id) {
            node.size = size;
        }
    }

    /// Handles a fired decay timer. Releases the override and resizes the node naturally.
    /// Returns `true` if the size was recomputed.
    pub fn on_decay(&mut self, token: TimerToken, graph: &mut Graph, node_id: NodeId) -> bool {
        if self.decay != Some(token) {
            return false;
        }
        self.decay = None;
        self.override_width = None;
        if let Some(node) = graph.node_mut(node_id) {
            node.size = node.natural_size();
        }
        true
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        if let Some(token) = self.decay.take() {
            timers.cancel(token);
        }
    }
}
