use super::{ConnectionChange, Controller, PortState, SlotSide, TimerOutcome};
use crate::error::StateError;
use crate::graph::Node;
use crate::host::HostContext;
use crate::reconciler::{FixedSlotLabels, stabilize_fixed_minimum};
use crate::scheduler::FiredTimer;
use crate::settings::Settings;
use serde_json::{Map, Value, json};

/// Ordered fallback inputs: a primary input, then as many fallbacks as are connected plus one.
#[derive(Debug, Clone)]
pub struct NonNullSwitch {
    ports: PortState,
    labels: FixedSlotLabels,
}

impl NonNullSwitch {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ports: PortState::new(settings),
            labels: FixedSlotLabels::default(),
        }
    }

    pub fn ports(&self) -> &PortState {
        &self.ports
    }

    /// Appends labelled inputs until the node has `count` of them.
    fn grow_to(&mut self, ctx: &mut HostContext<'_>, count: usize) {
        let mut editor = self.ports.editor(ctx);
        loop {
            let len = editor.node().map_or(count, |n| n.inputs.len());
            if len >= count || editor.add_input(&self.labels.label(len)).is_none() {
                break;
            }
        }
    }
}

impl Controller for NonNullSwitch {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_created(&mut self, ctx: &mut HostContext<'_>) {
        let minimum = self.labels.minimum;
        self.grow_to(ctx, minimum);
    }

    fn on_connections_changed(&mut self, ctx: &mut HostContext<'_>, change: ConnectionChange) {
        if change.side == SlotSide::Input {
            let delay = ctx.settings.stabilize_delay_ms;
            self.ports.request(ctx, delay);
        }
    }

    fn on_configure(
        &mut self,
        ctx: &mut HostContext<'_>,
        record: &Map<String, Value>,
    ) -> Result<(), StateError> {
        if let Some(value) = record.get("inputs_count") {
            let count = value.as_u64().ok_or_else(|| StateError::InvalidField {
                field: "inputs_count",
                message: format!("expected a non-negative integer, found {}", value),
            })?;
            // Links are restored after configure; they need their slots to exist.
            self.grow_to(ctx, count as usize);
        }
        self.ports.defer_first_pass(ctx);
        Ok(())
    }

    fn on_serialize(&self, node: &Node, record: &mut Map<String, Value>) {
        record.insert("inputs_count".to_string(), json!(node.inputs.len()));
    }

    fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) {
        if self.ports.on_timer(ctx, timer) != TimerOutcome::Reconcile {
            return;
        }
        let report = {
            let mut editor = self.ports.editor(ctx);
            stabilize_fixed_minimum(&mut editor, &self.labels)
        };
        log::debug!("node {}: stabilized inputs {:?}", ctx.node, report);
        ctx.mark_dirty();
    }

    fn on_removed(&mut self, ctx: &mut HostContext<'_>) {
        self.ports.teardown(ctx);
        ctx.timers.cancel_owned_by(ctx.node);
    }
}
