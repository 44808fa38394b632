use super::{Controller, RuleBook, RuleEvent, WidgetRole};
use crate::error::StateError;
use crate::graph::{Node, WidgetId};
use crate::host::HostContext;
use crate::rules::{SelectionChange, apply_group_rule};
use crate::settings::Settings;
use serde_json::{Map, Value};

const FALLBACK_LABEL: &str = "Bypass groups";
const DEFAULT_SOURCE: &str = r#"{
  "Rule A": ["Group 1", "Group 2"],
  "Rule B": ["Group 3", "Group 4"]
}"#;

/// Activates the groups listed by the selected rule and bypasses every other group.
#[derive(Debug, Clone)]
pub struct GroupRuleController {
    rules: RuleBook<String>,
}

impl GroupRuleController {
    pub fn new(_settings: &Settings) -> Self {
        Self {
            rules: RuleBook::new(FALLBACK_LABEL),
        }
    }

    pub fn rules(&self) -> &RuleBook<String> {
        &self.rules
    }

    fn apply(&self, ctx: &mut HostContext<'_>, name: &str) {
        let Some(titles) = self.rules.targets(name) else {
            return;
        };
        let outcome = apply_group_rule(ctx.graph, titles);
        log::info!(
            "node {}: applied group rule '{}' ({} active, {} bypassed)",
            ctx.node,
            name,
            outcome.activated.len(),
            outcome.bypassed.len()
        );
        ctx.mark_dirty();
    }
}

impl Controller for GroupRuleController {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_created(&mut self, ctx: &mut HostContext<'_>) {
        let Some(node) = ctx.node_mut() else {
            return;
        };
        self.rules.install(node, DEFAULT_SOURCE);
        if let Ok(SelectionChange::Switched(name)) = self.rules.refresh(ctx) {
            if !ctx.restoring {
                self.apply(ctx, &name);
            }
        }
    }

    fn on_configure(
        &mut self,
        ctx: &mut HostContext<'_>,
        record: &Map<String, Value>,
    ) -> Result<(), StateError> {
        self.rules.configure(ctx, record)
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

    fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        self.rules.widget(role)
    }
}
