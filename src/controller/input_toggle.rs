use super::{
    ConnectionChange, Controller, PortState, SlotSide, TimerOutcome, WidgetRole, display_label,
    sync_widget_label,
};
use crate::error::StateError;
use crate::graph::{Node, WidgetId, WidgetKind};
use crate::host::HostContext;
use crate::reconciler::{LabelStyle, stabilize_single_growth};
use crate::rules::{apply_toggle, toggle_display};
use crate::scheduler::FiredTimer;
use crate::settings::Settings;
use serde_json::{Map, Value, json};

const FALLBACK_LABEL: &str = "Bypass nodes";

/// One toggle for every node feeding the controller's inputs.
#[derive(Debug, Clone)]
pub struct InputToggleController {
    ports: PortState,
    toggle: Option<WidgetId>,
}

impl InputToggleController {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ports: PortState::new(settings),
            toggle: None,
        }
    }

    pub fn ports(&self) -> &PortState {
        &self.ports
    }

    fn toggle_value(&self, ctx: &HostContext<'_>) -> bool {
        self.toggle
            .and_then(|id| ctx.node().and_then(|node| node.widget(id)))
            .is_none_or(|widget| widget.as_bool())
    }

    fn set_toggle_value(&self, ctx: &mut HostContext<'_>, on: bool) {
        let widget = self.toggle.and_then(|id| ctx.node_mut().and_then(|n| n.widget_mut(id)));
        if let Some(widget) = widget {
            widget.value = json!(on);
        }
    }

    /// Shows the sources' common mode, or keeps the last value when they disagree.
    fn sync_toggle(&self, ctx: &mut HostContext<'_>) {
        let current = self.toggle_value(ctx);
        let shown = toggle_display(ctx.graph, ctx.classifier, ctx.node, current);
        if shown != current {
            log::debug!("node {}: toggle follows sources -> {}", ctx.node, shown);
            self.set_toggle_value(ctx, shown);
        }
    }

    fn reconcile(&mut self, ctx: &mut HostContext<'_>) {
        let classifier = ctx.classifier;
        let report = {
            let mut editor = self.ports.editor(ctx);
            stabilize_single_growth(&mut editor, classifier, LabelStyle::Title)
        };
        log::debug!("node {}: stabilized inputs {:?}", ctx.node, report);
        self.sync_toggle(ctx);
        ctx.mark_dirty();
    }
}

impl Controller for InputToggleController {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_created(&mut self, ctx: &mut HostContext<'_>) {
        if ctx.node().is_some_and(|n| n.inputs.is_empty()) {
            self.ports.editor(ctx).add_input("");
        }
        let Some(node) = ctx.node_mut() else {
            return;
        };
        let label = display_label(node, FALLBACK_LABEL);
        self.toggle = Some(node.add_widget(
            &label,
            WidgetKind::Toggle {
                on: "yes".to_string(),
                off: "no".to_string(),
            },
            json!(true),
        ));
        self.ports.defer_first_pass(ctx);
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
        if let Some(value) = record.get("toggle") {
            let on = value.as_bool().ok_or_else(|| StateError::InvalidField {
                field: "toggle",
                message: "expected a boolean".to_string(),
            })?;
            self.set_toggle_value(ctx, on);
        }
        self.ports.defer_first_pass(ctx);
        Ok(())
    }

    fn on_serialize(&self, node: &Node, record: &mut Map<String, Value>) {
        let on = self
            .toggle
            .and_then(|id| node.widget(id))
            .is_none_or(|widget| widget.as_bool());
        record.insert("toggle".to_string(), json!(on));
    }

    fn on_draw_foreground(&mut self, ctx: &mut HostContext<'_>) {
        if sync_widget_label(ctx, self.toggle, FALLBACK_LABEL) {
            ctx.mark_dirty();
        }
    }

    fn on_widget_changed(&mut self, ctx: &mut HostContext<'_>, widget: WidgetId) {
        if Some(widget) != self.toggle {
            return;
        }
        let on = self.toggle_value(ctx);
        let outcome = apply_toggle(ctx.graph, ctx.classifier, ctx.node, on);
        log::info!(
            "node {}: toggled {} source(s) {}",
            ctx.node,
            outcome.touched(),
            if on { "on" } else { "off" }
        );
        ctx.mark_dirty();
    }

    fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) {
        if self.ports.on_timer(ctx, timer) == TimerOutcome::Reconcile {
            self.reconcile(ctx);
        }
    }

    fn on_removed(&mut self, ctx: &mut HostContext<'_>) {
        self.ports.teardown(ctx);
        ctx.timers.cancel_owned_by(ctx.node);
    }

    fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        match role {
            WidgetRole::Toggle => self.toggle,
            _ => None,
        }
    }
}
