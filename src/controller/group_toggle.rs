use super::{Controller, WidgetRole, display_label, sync_widget_label};
use crate::error::StateError;
use crate::graph::{Node, WidgetId, WidgetKind};
use crate::host::HostContext;
use crate::rules::{RuleSelector, apply_group_toggle};
use crate::scheduler::{FiredTimer, TimerKind, TimerToken};
use crate::settings::Settings;
use itertools::Itertools;
use serde_json::{Map, Value, json};

const FALLBACK_LABEL: &str = "Bypass group";
const GROUP_SELECTOR: &str = "group";

/// Switches every node inside one selected group on or off.
///
/// Group titles are not observable through events, so the title list is
/// polled and the selector rebuilt whenever it differs.
#[derive(Debug, Clone)]
pub struct GroupToggleController {
    groups: RuleSelector,
    selector: Option<WidgetId>,
    toggle: Option<WidgetId>,
    poll: Option<TimerToken>,
    initial_apply: Option<TimerToken>,
}

impl GroupToggleController {
    pub fn new(_settings: &Settings) -> Self {
        Self {
            groups: RuleSelector::new(),
            selector: None,
            toggle: None,
            poll: None,
            initial_apply: None,
        }
    }

    pub fn selected_group(&self) -> Option<&str> {
        self.groups.selected()
    }

    fn toggle_value(&self, ctx: &HostContext<'_>) -> bool {
        self.toggle
            .and_then(|id| ctx.node().and_then(|node| node.widget(id)))
            .is_none_or(|widget| widget.as_bool())
    }

    fn sync_selector_widget(&self, ctx: &mut HostContext<'_>) {
        let values = self.groups.display_values();
        let selected = self.groups.selected().unwrap_or_default().to_string();
        let widget = self.selector.and_then(|id| ctx.node_mut().and_then(|n| n.widget_mut(id)));
        if let Some(widget) = widget {
            widget.kind = WidgetKind::Combo { values };
            widget.value = json!(selected);
        }
    }

    /// Applies the toggle to the selected group. A missing group is skipped.
    fn apply(&self, ctx: &mut HostContext<'_>) {
        let Some(title) = self.groups.selected() else {
            return;
        };
        let on = self.toggle_value(ctx);
        match apply_group_toggle(ctx.graph, title, on) {
            Some(outcome) => {
                log::info!(
                    "node {}: group '{}' {} ({} node(s))",
                    ctx.node,
                    title,
                    if on { "on" } else { "off" },
                    outcome.touched()
                );
                ctx.mark_dirty();
            }
            None => log::debug!("node {}: group '{}' no longer exists", ctx.node, title),
        }
    }

    /// Rebuilds the group list if the set of titles changed since the last check.
    fn poll_groups(&mut self, ctx: &mut HostContext<'_>) {
        let current = ctx.graph.accessor().group_titles();
        let known = self.groups.options().iter().sorted().collect_vec();
        if current.iter().sorted().collect_vec() == known {
            return;
        }
        log::debug!("node {}: group list changed, rebuilding selector", ctx.node);
        self.groups.rebuild(current);
        self.sync_selector_widget(ctx);
        ctx.mark_dirty();
    }
}

impl Controller for GroupToggleController {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_created(&mut self, ctx: &mut HostContext<'_>) {
        self.groups.rebuild(ctx.graph.accessor().group_titles());
        let Some(node) = ctx.node_mut() else {
            return;
        };
        self.selector = Some(node.add_widget(
            GROUP_SELECTOR,
            WidgetKind::Combo { values: Vec::new() },
            Value::Null,
        ));
        let label = display_label(node, FALLBACK_LABEL);
        self.toggle = Some(node.add_widget(
            &label,
            WidgetKind::Toggle {
                on: "yes".to_string(),
                off: "no".to_string(),
            },
            json!(true),
        ));
        self.sync_selector_widget(ctx);

        let interval = ctx.settings.group_poll_interval_ms;
        self.poll = Some(ctx.timers.schedule_periodic(ctx.node, TimerKind::GroupPoll, interval));
        let delay = ctx.settings.deferred_restore_ms;
        self.initial_apply = Some(ctx.timers.schedule(ctx.node, TimerKind::DeferredRestore, delay));
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
            let widget = self.toggle.and_then(|id| ctx.node_mut().and_then(|n| n.widget_mut(id)));
            if let Some(widget) = widget {
                widget.value = json!(on);
            }
        }
        match record.get("selectedGroupName") {
            Some(Value::String(title)) if !title.is_empty() => {
                // Kept even if no such group exists yet; applying skips a missing group.
                self.groups.restore(title);
                self.sync_selector_widget(ctx);
            }
            Some(Value::String(_)) | Some(Value::Null) | None => {}
            Some(_) => {
                return Err(StateError::InvalidField {
                    field: "selectedGroupName",
                    message: "expected a string".to_string(),
                });
            }
        }
        Ok(())
    }

    fn on_serialize(&self, node: &Node, record: &mut Map<String, Value>) {
        record.insert(
            "selectedGroupName".to_string(),
            json!(self.groups.selected().unwrap_or_default()),
        );
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
        if Some(widget) == self.selector {
            let title = ctx
                .node()
                .and_then(|node| node.widget(widget))
                .map(|w| w.as_str().to_string())
                .unwrap_or_default();
            if !self.groups.select(&title) {
                self.sync_selector_widget(ctx);
                return;
            }
            self.apply(ctx);
        } else if Some(widget) == self.toggle {
            self.apply(ctx);
        }
    }

    fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) {
        match timer.kind {
            TimerKind::GroupPoll if self.poll == Some(timer.token) => self.poll_groups(ctx),
            TimerKind::DeferredRestore if self.initial_apply == Some(timer.token) => {
                self.initial_apply = None;
                self.apply(ctx);
            }
            _ => {}
        }
    }

    fn on_removed(&mut self, ctx: &mut HostContext<'_>) {
        if let Some(token) = self.poll.take() {
            ctx.timers.cancel(token);
        }
        if let Some(token) = self.initial_apply.take() {
            ctx.timers.cancel(token);
        }
        ctx.timers.cancel_owned_by(ctx.node);
    }

    fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        match role {
            WidgetRole::GroupSelector => self.selector,
            WidgetRole::Toggle => self.toggle,
            _ => None,
        }
    }
}
