use super::{WidgetRole, display_label, sync_widget_label};
use crate::error::{RuleParseError, StateError};
use crate::graph::{Node, WidgetId, WidgetKind};
use crate::host::HostContext;
use crate::rules::{RuleSelector, RuleTable, RuleTarget, SelectionChange};
use serde_json::{Map, Value, json};

/// Name of the multiline rule source widget.
pub const RULE_SOURCE_WIDGET: &str = "json_rules";
/// Name of the button that re-parses the rule source.
pub const REFRESH_BUTTON: &str = "refresh rules";

/// What a widget change meant for the rule book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEvent {
    /// The source was re-parsed successfully.
    Refreshed(SelectionChange),
    /// The user picked a rule.
    Selected(String),
    /// Nothing to do: a failed parse, an unrelated widget, or an unknown name.
    Unchanged,
}

/// Rule table, selector and the three widgets of a rule controller.
#[derive(Debug, Clone)]
pub struct RuleBook<T> {
    table: RuleTable<T>,
    selector: RuleSelector,
    fallback_label: &'static str,
    source_widget: Option<WidgetId>,
    refresh_button: Option<WidgetId>,
    selector_widget: Option<WidgetId>,
}

impl<T: RuleTarget> RuleBook<T> {
    pub fn new(fallback_label: &'static str) -> Self {
        Self {
            table: RuleTable::new(),
            selector: RuleSelector::new(),
            fallback_label,
            source_widget: None,
            refresh_button: None,
            selector_widget: None,
        }
    }

    /// Adds the source text, refresh button and selector widgets, in that order.
    pub fn install(&mut self, node: &mut Node, default_source: &str) {
        self.source_widget = Some(node.add_widget(
            RULE_SOURCE_WIDGET,
            WidgetKind::Text { multiline: true },
            json!(default_source),
        ));
        self.refresh_button =
            Some(node.add_widget(REFRESH_BUTTON, WidgetKind::Button, Value::Null));
        let label = display_label(node, self.fallback_label);
        self.selector_widget = Some(node.add_widget(
            &label,
            WidgetKind::Combo {
                values: self.selector.display_values(),
            },
            json!(""),
        ));
    }

    pub fn table(&self) -> &RuleTable<T> {
        &self.table
    }

    pub fn selector(&self) -> &RuleSelector {
        &self.selector
    }

    pub fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        match role {
            WidgetRole::RuleSource => self.source_widget,
            WidgetRole::Refresh => self.refresh_button,
            WidgetRole::RuleSelector => self.selector_widget,
            _ => None,
        }
    }

    /// Targets of a rule. `None` if the rule does not exist.
    pub fn targets(&self, name: &str) -> Option<&[T]> {
        self.table.get(name)
    }

    /// Parses the source widget's text and replaces the table on success.
    ///
    /// A failure queues a notice for the user and leaves table and selection as they were.
    pub fn refresh(
        &mut self,
        ctx: &mut HostContext<'_>,
    ) -> Result<SelectionChange, RuleParseError> {
        let source = self
            .source_widget
            .and_then(|id| ctx.node().and_then(|node| node.widget(id)))
            .map(|widget| widget.as_str().to_string())
            .unwrap_or_default();

        match RuleTable::parse(&source) {
            Ok(table) => Ok(self.replace_table(ctx, table)),
            Err(err) => {
                log::warn!("node {}: rejected rule source: {}", ctx.node, err);
                ctx.notify(format!("Rule parse error: {}", err));
                Err(err)
            }
        }
    }

    /// Installs a new table and rebuilds the selector from its names.
    pub fn replace_table(
        &mut self,
        ctx: &mut HostContext<'_>,
        table: RuleTable<T>,
    ) -> SelectionChange {
        log::info!("node {}: loaded {} rule(s)", ctx.node, table.len());
        self.table = table;
        let change = self.selector.rebuild(self.table.names());
        self.sync_selector_widget(ctx);
        ctx.mark_dirty();
        change
    }

    fn sync_selector_widget(&self, ctx: &mut HostContext<'_>) {
        let values = self.selector.display_values();
        let selected = self.selector.selected().unwrap_or_default().to_string();
        let widget = self
            .selector_widget
            .and_then(|id| ctx.node_mut().and_then(|node| node.widget_mut(id)));
        if let Some(widget) = widget {
            widget.kind = WidgetKind::Combo { values };
            widget.value = json!(selected);
        }
    }

    pub fn on_widget_changed(&mut self, ctx: &mut HostContext<'_>, widget: WidgetId) -> RuleEvent {
        if Some(widget) == self.refresh_button {
            return match self.refresh(ctx) {
                Ok(change) => RuleEvent::Refreshed(change),
                Err(_) => RuleEvent::Unchanged,
            };
        }
        if Some(widget) != self.selector_widget {
            return RuleEvent::Unchanged;
        }
        let name = ctx
            .node()
            .and_then(|node| node.widget(widget))
            .map(|w| w.as_str().to_string())
            .unwrap_or_default();
        if self.selector.select(&name) {
            RuleEvent::Selected(name)
        } else {
            log::debug!("node {}: '{}' is not a rule name", ctx.node, name);
            self.sync_selector_widget(ctx);
            RuleEvent::Unchanged
        }
    }

    /// Keeps the selector named after the node title.
    pub fn sync_label(&self, ctx: &mut HostContext<'_>) {
        if sync_widget_label(ctx, self.selector_widget, self.fallback_label) {
            ctx.mark_dirty();
        }
    }

    pub fn serialize(&self, record: &mut Map<String, Value>) {
        record.insert("rulesData".to_string(), self.table.to_value());
        record.insert(
            "selectedRule".to_string(),
            json!(self.selector.selected().unwrap_or_default()),
        );
    }

    /// Restores the table and selection. Absent fields keep their defaults.
    ///
    /// Without a saved `selectedRule`, the selector widget's restored value is used.
    pub fn configure(
        &mut self,
        ctx: &mut HostContext<'_>,
        record: &Map<String, Value>,
    ) -> Result<(), StateError> {
        if let Some(data) = record.get("rulesData") {
            self.table = RuleTable::from_value(data).map_err(|e| StateError::InvalidField {
                field: "rulesData",
                message: e.to_string(),
            })?;
        }

        let saved = match record.get("selectedRule") {
            Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
                StateError::InvalidField {
                    field: "selectedRule",
                    message: "expected a string".to_string(),
                }
            })?,
            None => self
                .selector_widget
                .and_then(|id| ctx.node().and_then(|node| node.widget(id)))
                .map(|w| w.as_str().to_string())
                .unwrap_or_default(),
        };
        self.selector = RuleSelector::with_selected(&saved);
        self.selector.rebuild(self.table.names());
        self.sync_selector_widget(ctx);
        Ok(())
    }
}
