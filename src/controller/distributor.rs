use super::{ConnectionChange, Controller, PortState, SlotSide, TimerOutcome, WidgetRole};
use crate::error::StateError;
use crate::graph::{Node, WidgetId, WidgetKind};
use crate::host::HostContext;
use crate::reconciler::{ControlSnapshot, OPEN_OUTPUT_LABEL, ReplicatorState, stabilize_outputs};
use crate::scheduler::FiredTimer;
use crate::settings::Settings;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

const LOCK_WIDGET: &str = "lock parameters";

/// Fans parameters out to downstream inputs, one generated widget per connected output.
#[derive(Debug, Clone)]
pub struct ParameterDistributor {
    ports: PortState,
    state: ReplicatorState,
}

fn invalid(field: &'static str, message: impl Into<String>) -> StateError {
    StateError::InvalidField {
        field,
        message: message.into(),
    }
}

impl ParameterDistributor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ports: PortState::new(settings),
            state: ReplicatorState::new(),
        }
    }

    pub fn state(&self) -> &ReplicatorState {
        &self.state
    }

    pub fn ports(&self) -> &PortState {
        &self.ports
    }

    fn reconcile(&mut self, ctx: &mut HostContext<'_>) {
        let report = {
            let mut editor = self.ports.editor(ctx);
            stabilize_outputs(&mut editor, &mut self.state)
        };
        log::debug!(
            "node {}: stabilized outputs {:?} ({} control(s))",
            ctx.node,
            report,
            self.state.controls.len()
        );
        ctx.mark_dirty();
    }
}

impl Controller for ParameterDistributor {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_created(&mut self, ctx: &mut HostContext<'_>) {
        if ctx.node().is_some_and(|n| n.outputs.is_empty()) {
            self.ports.editor(ctx).add_output(OPEN_OUTPUT_LABEL);
        }
        let Some(node) = ctx.node_mut() else {
            return;
        };
        let lock = node.add_widget(
            LOCK_WIDGET,
            WidgetKind::Toggle {
                on: "locked".to_string(),
                off: "unlocked".to_string(),
            },
            json!(self.state.locked),
        );
        self.state.lock_widget = Some(lock);
        self.ports.defer_first_pass(ctx);
    }

    fn on_connections_changed(&mut self, ctx: &mut HostContext<'_>, change: ConnectionChange) {
        if change.side == SlotSide::Output {
            let delay = ctx.settings.stabilize_delay_ms;
            self.ports.request(ctx, delay);
        }
    }

    fn on_configure(
        &mut self,
        ctx: &mut HostContext<'_>,
        record: &Map<String, Value>,
    ) -> Result<(), StateError> {
        if let Some(value) = record.get("outputCounter") {
            let counter = value
                .as_u64()
                .and_then(|c| u32::try_from(c).ok())
                .ok_or_else(|| {
                    invalid(
                        "outputCounter",
                        format!("expected a counter, found {}", value),
                    )
                })?;
            self.state.output_counter = counter;
        }

        if let Some(value) = record.get("paramsLocked") {
            let locked = value
                .as_bool()
                .ok_or_else(|| invalid("paramsLocked", "expected a boolean"))?;
            self.state.locked = locked;
            let lock = self.state.lock_widget;
            if let Some(widget) =
                lock.and_then(|id| ctx.node_mut().and_then(|n| n.widget_mut(id)))
            {
                widget.value = json!(locked);
            }
        }

        self.state.pending_values = match record.get("widgets_values") {
            Some(Value::Array(values)) => Some(values.clone()),
            Some(Value::Null) | None => None,
            Some(_) => return Err(invalid("widgets_values", "expected an array")),
        };

        self.state.pending_snapshots = match record.get("outputWidgets") {
            Some(Value::Null) | None => None,
            Some(value) => Some(
                serde_json::from_value::<BTreeMap<usize, ControlSnapshot>>(value.clone())
                    .map_err(|e| invalid("outputWidgets", e.to_string()))?,
            ),
        };

        self.ports.defer_first_pass(ctx);
        Ok(())
    }

    fn on_serialize(&self, node: &Node, record: &mut Map<String, Value>) {
        record.insert("outputCounter".to_string(), json!(self.state.output_counter));
        record.insert("paramsLocked".to_string(), json!(self.state.locked));
        let values: Vec<Value> = self
            .state
            .parameter_widgets(node)
            .map(|widget| widget.value.clone())
            .collect();
        record.insert("widgets_values".to_string(), Value::Array(values));
        let snapshots = serde_json::to_value(self.state.snapshots(node)).unwrap_or(Value::Null);
        record.insert("outputWidgets".to_string(), snapshots);
    }

    fn on_widget_changed(&mut self, ctx: &mut HostContext<'_>, widget: WidgetId) {
        if Some(widget) != self.state.lock_widget {
            return;
        }
        let locked = ctx
            .node()
            .and_then(|node| node.widget(widget))
            .is_some_and(|w| w.as_bool());
        if locked != self.state.locked {
            log::info!(
                "node {}: parameters {}",
                ctx.node,
                if locked { "locked" } else { "unlocked" }
            );
        }
        self.state.locked = locked;
        ctx.mark_dirty();
    }

    fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) {
        if self.ports.on_timer(ctx, timer) == TimerOutcome::Reconcile {
            self.reconcile(ctx);
        }
    }

    /// Re-runs the reconciliation almost immediately.
    fn refresh(&mut self, ctx: &mut HostContext<'_>) {
        self.ports.request(ctx, 1);
    }

    fn on_removed(&mut self, ctx: &mut HostContext<'_>) {
        self.ports.teardown(ctx);
        ctx.timers.cancel_owned_by(ctx.node);
    }

    fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        match role {
            WidgetRole::Lock => self.state.lock_widget,
            _ => None,
        }
    }

    fn restores_widget_values(&self) -> bool {
        false
    }
}
