use super::{
    ConnectionChange, Controller, PortState, RuleBook, RuleEvent, SlotSide, TimerOutcome,
    WidgetRole,
};
use crate::error::StateError;
use crate::graph::{Node, WidgetId};
use crate::host::HostContext;
use crate::reconciler::{LabelStyle, stabilize_single_growth};
use crate::rules::{SelectionChange, apply_index_rule};
use crate::scheduler::FiredTimer;
use crate::settings::Settings;
use serde_json::{Map, Value};

const FALLBACK_LABEL: &str = "Bypass nodes";
const DEFAULT_SOURCE: &str = r#"{
  "Rule A": [1, 2, 3],
  "Rule B": [4, 5, 6]
}"#;

/// Activates the sources of the input slots listed by the selected rule and
/// bypasses the sources of every other connected slot.
///
/// Inputs follow the single-growth shape and are labelled `[<index>] <source title>`.
#[derive(Debug, Clone)]
pub struct IndexRuleController {
    rules: RuleBook<i64>,
    ports: PortState,
}

impl IndexRuleController {
    pub fn new(settings: &Settings) -> Self {
        Self {
            rules: RuleBook::new(FALLBACK_LABEL),
            ports: PortState::new(settings),
        }
    }

    pub fn rules(&self) -> &RuleBook<i64> {
        &self.rules
    }

    pub fn ports(&self) -> &PortState {
        &self.ports
    }

    fn apply(&self, ctx: &mut HostContext<'_>, name: &str) {
        let Some(slots) = self.rules.targets(name) else {
            return;
        };
        let outcome = apply_index_rule(ctx.graph, ctx.classifier, ctx.node, slots);
        log::info!(
            "node {}: applied index rule '{}' ({} active, {} bypassed)",
            ctx.node,
            name,
            outcome.activated.len(),
            outcome.bypassed.len()
        );
        ctx.mark_dirty();
    }

    fn reconcile(&mut self, ctx: &mut HostContext<'_>) {
        let classifier = ctx.classifier;
        let report = {
            let mut editor = self.ports.editor(ctx);
            stabilize_single_growth(&mut editor, classifier, LabelStyle::Indexed)
        };
        log::debug!("node {}: stabilized inputs {:?}", ctx.node, report);
        ctx.mark_dirty();
    }
}

impl Controller for IndexRuleController {
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
        self.rules.install(node, DEFAULT_SOURCE);
        if let Ok(SelectionChange::Switched(name)) = self.rules.refresh(ctx) {
            if !ctx.restoring {
                self.apply(ctx, &name);
            }
        }
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
        self.rules.configure(ctx, record)?;
        self.ports.defer_first_pass(ctx);
        Ok(())
    }

    fn on_serialize(&self, _node: &Node, record: &mut Map<String, Value>) {
        self.rules.serialize(record);
    }

    fn on_draw_foreground(&mut self, ctx: &mut HostContext<'_>) {
        self.rules.sync_label(ctx);
    }

    fn on_widget_changed(&mut self, ctx: &mut HostContext<'_>, widget: WidgetId) {
        match self.rules.on_widget_changed(ctx, widget) {
            RuleEvent::Refreshed(SelectionChange::Switched(name)) | RuleEvent::Selected(name) => {
                self.apply(ctx, &name)
            }
            _ => {}
        }
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
        self.rules.widget(role)
    }
}
