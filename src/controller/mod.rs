//! Controller nodes: the node types that drive other nodes' modes or keep
//! their own port list in shape.
//!
//! Every controller implements [`Controller`]. The host calls the hooks in
//! the order it would call them on a live editor: `on_created` once, then any
//! number of connection, widget, timer and draw callbacks, `on_serialize` /
//! `on_configure` around save and load, and `on_removed` last.

use crate::error::StateError;
use crate::graph::{Node, WidgetId};
use crate::host::HostContext;
use crate::scheduler::FiredTimer;
use crate::settings::Settings;
use serde_json::{Map, Value};
use std::fmt::Debug;

mod distributor;
mod group_rules;
mod group_toggle;
mod index_rules;
mod input_toggle;
mod non_null_switch;
mod ports;
mod rulebook;

pub use distributor::ParameterDistributor;
pub use group_rules::GroupRuleController;
pub use group_toggle::GroupToggleController;
pub use index_rules::IndexRuleController;
pub use input_toggle::InputToggleController;
pub use non_null_switch::NonNullSwitch;
pub use ports::{PortState, TimerOutcome};
pub use rulebook::{REFRESH_BUTTON, RULE_SOURCE_WIDGET, RuleBook, RuleEvent};

/// Which side of the node a connection change happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSide {
    Input,
    Output,
}

/// A connection made or broken on one of the controller's ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionChange {
    pub side: SlotSide,
    pub slot: usize,
    pub connected: bool,
}

/// The widgets a session may need to address without knowing their names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetRole {
    /// Multiline rule source text.
    RuleSource,
    /// Button that re-parses the rule source.
    Refresh,
    /// Combo listing the rule names.
    RuleSelector,
    /// Combo listing the group titles.
    GroupSelector,
    /// On/off toggle of single-target controllers.
    Toggle,
    /// Lock of generated parameter widgets.
    Lock,
}

/// Capability set of a controller node.
pub trait Controller: Debug {
    /// Host type name this controller is registered under.
    fn type_name(&self) -> &'static str;

    /// The node was placed. Build ports and widgets here.
    fn on_created(&mut self, ctx: &mut HostContext<'_>);

    fn on_connections_changed(&mut self, ctx: &mut HostContext<'_>, change: ConnectionChange) {
        let _ = (ctx, change);
    }

    /// Restores controller fields from a saved node record.
    ///
    /// Runs after the host restored ports and widget values but before it
    /// restores links.
    fn on_configure(
        &mut self,
        ctx: &mut HostContext<'_>,
        record: &Map<String, Value>,
    ) -> Result<(), StateError> {
        let _ = (ctx, record);
        Ok(())
    }

    /// Adds controller fields to the node record the host is writing.
    fn on_serialize(&self, node: &Node, record: &mut Map<String, Value>) {
        let _ = (node, record);
    }

    /// Called once per drawn frame.
    fn on_draw_foreground(&mut self, ctx: &mut HostContext<'_>) {
        let _ = ctx;
    }

    /// A widget value changed or a button was pressed.
    fn on_widget_changed(&mut self, ctx: &mut HostContext<'_>, widget: WidgetId) {
        let _ = (ctx, widget);
    }

    /// A timer owned by this node fired.
    fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) {
        let _ = (ctx, timer);
    }

    /// Manual "refresh" entry point offered in the node's context menu.
    fn refresh(&mut self, ctx: &mut HostContext<'_>) {
        let _ = ctx;
    }

    /// The node is being removed. Every timer the node owns must be cancelled.
    fn on_removed(&mut self, ctx: &mut HostContext<'_>) {
        let cancelled = ctx.timers.cancel_owned_by(ctx.node);
        if cancelled > 0 {
            log::debug!("node {}: cancelled {} timer(s) on removal", ctx.node, cancelled);
        }
    }

    fn widget(&self, role: WidgetRole) -> Option<WidgetId> {
        let _ = role;
        None
    }

    /// Whether the host should restore saved `widgets_values` by position.
    /// Controllers that regenerate widgets restore values themselves.
    fn restores_widget_values(&self) -> bool {
        true
    }
}

/// Name shown for a controller's main widget: the node title, or a fallback.
pub(crate) fn display_label(node: &Node, fallback: &str) -> String {
    if node.title.is_empty() {
        fallback.to_string()
    } else {
        node.title.clone()
    }
}

/// Renames a widget to match the node title. Returns `true` if the name changed.
pub(crate) fn sync_widget_label(
    ctx: &mut HostContext<'_>,
    widget: Option<WidgetId>,
    fallback: &str,
) -> bool {
    let Some(node) = ctx.node_mut() else {
        return false;
    };
    let label = display_label(node, fallback);
    match widget.and_then(|id| node.widget_mut(id)) {
        Some(widget) if widget.name != label => {
            widget.name = label;
            true
        }
        _ => false,
    }
}

/// Registers every controller type under its host type name.
macro_rules! define_controllers {
    ( $( ($struct_name:ident, $type_name:literal) ),* $(,)? ) => {
        $(
            impl $struct_name {
                pub const TYPE_NAME: &'static str = $type_name;
            }
        )*

        /// Host type names of every registered controller.
        pub const CONTROLLER_TYPES: &[&str] = &[ $( $type_name ),* ];

        /// Creates the controller registered under `type_name`.
        pub fn create_controller(
            type_name: &str,
            settings: &Settings,
        ) -> Option<Box<dyn Controller>> {
            match type_name {
                $( $type_name => Some(Box::new($struct_name::new(settings))), )*
                _ => None,
            }
        }
    };
}

define_controllers! {
    (GroupRuleController, "AdvancedGroupBypasserBen"),
    (IndexRuleController, "AdvancedNodeBypasserBen"),
    (InputToggleController, "DynamicInputBypasser"),
    (GroupToggleController, "GroupBypasserBen"),
    (NonNullSwitch, "NonNullSwitchBen"),
    (ParameterDistributor, "ParameterDistributorBen"),
}

pub fn is_controller_type(type_name: &str) -> bool {
    CONTROLLER_TYPES.contains(&type_name)
}
