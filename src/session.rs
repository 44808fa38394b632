//! The in-memory host: graph, controllers, virtual clock and canvas.
//!
//! A `Session` plays the part of the node editor. It owns every piece of
//! shared state and hands a [`HostContext`] to one controller at a time, so
//! callbacks never overlap and never reach for globals.

use crate::controller::{
    ConnectionChange, Controller, SlotSide, WidgetRole, create_controller, is_controller_type,
};
use crate::document::{
    GroupRecord, IntoWorkflow, LinkRecord, NodeRecord, WorkflowDocument, validate,
};
use crate::error::{SessionError, StateError};
use crate::graph::{Graph, Link, LinkId, Node, NodeId, WidgetId};
use crate::host::{Canvas, HostContext, Notice};
use crate::resolver::RelayClassifier;
use crate::scheduler::TimerQueue;
use crate::settings::Settings;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use std::path::Path;

/// Upper bound on timer batches `settle` will run before giving up.
const SETTLE_LIMIT: usize = 10_000;

/// A builder for creating a configured `Session`.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    settings: Settings,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Treats node types containing `pattern` as transparent relays.
    pub fn with_relay_pattern(mut self, pattern: &str) -> Self {
        self.settings.relay_type_patterns.push(pattern.to_string());
        self
    }

    pub fn with_stabilize_delay(mut self, delay_ms: u64) -> Self {
        self.settings.stabilize_delay_ms = delay_ms;
        self
    }

    pub fn with_width_decay(mut self, decay_ms: u64) -> Self {
        self.settings.width_decay_ms = decay_ms;
        self
    }

    pub fn with_group_poll_interval(mut self, interval_ms: u64) -> Self {
        self.settings.group_poll_interval_ms = interval_ms;
        self
    }

    pub fn with_deferred_restore(mut self, delay_ms: u64) -> Self {
        self.settings.deferred_restore_ms = delay_ms;
        self
    }

    pub fn build(self) -> Session {
        let classifier = self.settings.relay_classifier();
        Session {
            graph: Graph::new(),
            timers: TimerQueue::new(),
            controllers: IndexMap::new(),
            canvas: Canvas::default(),
            notices: Vec::new(),
            settings: self.settings,
            classifier,
            document_extra: Map::new(),
            restoring: false,
        }
    }
}

/// What a document load restored, and what it had to leave out.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub nodes: usize,
    pub controllers: usize,
    pub links: usize,
    /// Links whose endpoint ports did not exist after configure.
    pub skipped_links: Vec<LinkId>,
    /// Controllers whose saved fields were rejected. They keep their defaults.
    pub rejected: Vec<(NodeId, StateError)>,
}

#[derive(Debug)]
pub struct Session {
    graph: Graph,
    timers: TimerQueue,
    controllers: IndexMap<NodeId, Box<dyn Controller>>,
    canvas: Canvas,
    notices: Vec<Notice>,
    settings: Settings,
    classifier: RelayClassifier,
    document_extra: Map<String, Value>,
    restoring: bool,
}

impl Default for Session {
    fn default() -> Self {
        SessionBuilder::new().build()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Runs `f` against one controller with a context over the rest of the session.
    /// Returns `None` if the node has no controller.
    fn dispatch<R>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut dyn Controller, &mut HostContext<'_>) -> R,
    ) -> Option<R> {
        let Session {
            graph,
            timers,
            controllers,
            canvas,
            notices,
            settings,
            classifier,
            restoring,
            ..
        } = self;
        let controller = controllers.get_mut(&node)?;
        let mut ctx = HostContext {
            node,
            graph,
            timers,
            canvas,
            notices,
            settings,
            classifier,
            restoring: *restoring,
        };
        Some(f(controller.as_mut(), &mut ctx))
    }

    fn notify_connection(&mut self, node: NodeId, side: SlotSide, slot: usize, connected: bool) {
        let change = ConnectionChange {
            side,
            slot,
            connected,
        };
        self.dispatch(node, |controller, ctx| controller.on_connections_changed(ctx, change));
    }

    fn notify_link(&mut self, link: &Link, connected: bool) {
        self.notify_connection(link.origin_id, SlotSide::Output, link.origin_slot, connected);
        self.notify_connection(link.target_id, SlotSide::Input, link.target_slot, connected);
    }

    // --- Node lifecycle ---

    /// Places a node. Registered controller types get their controller and `on_created`.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let type_tag = node.type_tag.clone();
        let id = self.graph.add_node(node);
        if let Some(controller) = create_controller(&type_tag, &self.settings) {
            log::debug!("node {}: created {} controller", id, type_tag);
            self.controllers.insert(id, controller);
            self.dispatch(id, |controller, ctx| controller.on_created(ctx));
        }
        self.canvas.set_dirty();
        id
    }

    /// Places a new controller node of a registered type.
    pub fn add_controller(&mut self, type_name: &str) -> Result<NodeId, SessionError> {
        if !is_controller_type(type_name) {
            return Err(SessionError::UnknownControllerType(type_name.to_string()));
        }
        Ok(self.add_node(Node::new(type_name)))
    }

    /// Removes a node and its links. The controller is torn down first, then
    /// the other endpoints of the removed links are told about the disconnect.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, SessionError> {
        if self.graph.node(id).is_none() {
            return Err(SessionError::NodeNotFound(id));
        }
        self.dispatch(id, |controller, ctx| controller.on_removed(ctx));
        self.controllers.shift_remove(&id);
        self.timers.cancel_owned_by(id);

        let (node, links) = self
            .graph
            .remove_node(id)
            .ok_or(SessionError::NodeNotFound(id))?;
        for link in &links {
            self.notify_link(link, false);
        }
        self.canvas.set_dirty();
        Ok(node)
    }

    pub fn is_controller(&self, id: NodeId) -> bool {
        self.controllers.contains_key(&id)
    }

    pub fn controller(&self, id: NodeId) -> Option<&dyn Controller> {
        self.controllers.get(&id).map(|c| c.as_ref())
    }

    pub fn controller_type(&self, id: NodeId) -> Option<&'static str> {
        self.controller(id).map(|c| c.type_name())
    }

    pub fn controller_ids(&self) -> Vec<NodeId> {
        self.controllers.keys().copied().collect()
    }

    // --- Connections ---

    /// Connects an output to an input, replacing whatever fed that input.
    /// Returns `None` if an endpoint is missing or the types are incompatible.
    pub fn connect(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Option<LinkId> {
        let connection = self.graph.connect(origin, origin_slot, target, target_slot)?;
        if let Some(replaced) = &connection.replaced {
            self.notify_connection(
                replaced.origin_id,
                SlotSide::Output,
                replaced.origin_slot,
                false,
            );
        }
        self.notify_connection(origin, SlotSide::Output, origin_slot, true);
        self.notify_connection(target, SlotSide::Input, target_slot, true);
        self.canvas.set_dirty();
        Some(connection.link)
    }

    /// Drops the link feeding an input. Returns `false` if it was not connected.
    pub fn disconnect_input(&mut self, node: NodeId, slot: usize) -> bool {
        let link = self
            .graph
            .node(node)
            .and_then(|n| n.inputs.get(slot))
            .and_then(|input| input.link);
        match link {
            Some(link) => self.disconnect(link),
            None => false,
        }
    }

    /// Removes a link and notifies both endpoints.
    pub fn disconnect(&mut self, link: LinkId) -> bool {
        let Some(removed) = self.graph.remove_link(link) else {
            return false;
        };
        self.notify_link(&removed, false);
        self.canvas.set_dirty();
        true
    }

    // --- Widgets ---

    /// Sets a widget's value and delivers the change to the node's controller.
    pub fn set_widget(
        &mut self,
        node: NodeId,
        widget: WidgetId,
        value: Value,
    ) -> Result<(), SessionError> {
        let target = self
            .graph
            .node_mut(node)
            .ok_or(SessionError::NodeNotFound(node))?
            .widget_mut(widget)
            .ok_or_else(|| SessionError::WidgetNotFound {
                node,
                name: format!("#{}", widget.0),
            })?;
        target.value = value;
        self.dispatch(node, |controller, ctx| controller.on_widget_changed(ctx, widget));
        self.canvas.set_dirty();
        Ok(())
    }

    /// Sets a widget's value by widget name.
    pub fn set_widget_value(
        &mut self,
        node: NodeId,
        name: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        let widget = self.widget_named(node, name)?;
        self.set_widget(node, widget, value)
    }

    /// Presses a button widget.
    pub fn press_button(&mut self, node: NodeId, name: &str) -> Result<(), SessionError> {
        let widget = self.widget_named(node, name)?;
        let value = self
            .graph
            .node(node)
            .and_then(|n| n.widget(widget))
            .map_or(Value::Null, |w| w.value.clone());
        self.set_widget(node, widget, value)
    }

    fn widget_named(&self, node: NodeId, name: &str) -> Result<WidgetId, SessionError> {
        self.graph
            .node(node)
            .ok_or(SessionError::NodeNotFound(node))?
            .widget_named(name)
            .map(|w| w.id)
            .ok_or_else(|| SessionError::WidgetNotFound {
                node,
                name: name.to_string(),
            })
    }

    /// The controller widget playing `role`.
    pub fn role_widget(&self, node: NodeId, role: WidgetRole) -> Result<WidgetId, SessionError> {
        if self.graph.node(node).is_none() {
            return Err(SessionError::NodeNotFound(node));
        }
        self.controller(node)
            .ok_or(SessionError::NotAController(node))?
            .widget(role)
            .ok_or(SessionError::MissingWidget { node, role })
    }

    fn set_role(
        &mut self,
        node: NodeId,
        role: WidgetRole,
        value: Value,
    ) -> Result<(), SessionError> {
        let widget = self.role_widget(node, role)?;
        self.set_widget(node, widget, value)
    }

    /// Replaces a rule controller's source text. Takes effect on the next refresh.
    pub fn set_rules_source(&mut self, node: NodeId, source: &str) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::RuleSource, json!(source))
    }

    /// Re-parses a rule controller's source, as the refresh button does.
    pub fn refresh_rules(&mut self, node: NodeId) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::Refresh, Value::Null)
    }

    pub fn select_rule(&mut self, node: NodeId, name: &str) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::RuleSelector, json!(name))
    }

    pub fn set_toggle(&mut self, node: NodeId, on: bool) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::Toggle, json!(on))
    }

    pub fn select_group(&mut self, node: NodeId, title: &str) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::GroupSelector, json!(title))
    }

    pub fn set_locked(&mut self, node: NodeId, locked: bool) -> Result<(), SessionError> {
        self.set_role(node, WidgetRole::Lock, json!(locked))
    }

    /// The controller's manual refresh entry point.
    pub fn refresh(&mut self, node: NodeId) -> Result<(), SessionError> {
        if self.graph.node(node).is_none() {
            return Err(SessionError::NodeNotFound(node));
        }
        self.dispatch(node, |controller, ctx| controller.refresh(ctx))
            .ok_or(SessionError::NotAController(node))
    }

    // --- Node edits ---

    pub fn set_title(&mut self, node: NodeId, title: &str) -> Result<(), SessionError> {
        let target = self.graph.node_mut(node).ok_or(SessionError::NodeNotFound(node))?;
        target.title = title.to_string();
        self.canvas.set_dirty();
        Ok(())
    }

    pub fn move_node(&mut self, node: NodeId, x: f32, y: f32) -> Result<(), SessionError> {
        let target = self.graph.node_mut(node).ok_or(SessionError::NodeNotFound(node))?;
        target.pos = [x, y];
        self.canvas.set_dirty();
        Ok(())
    }

    // --- Time and frames ---

    /// Moves virtual time forward by `ms`, firing every timer that comes due.
    /// Returns how many timers fired.
    pub fn advance(&mut self, ms: u64) -> usize {
        let target = self.timers.now().saturating_add(ms);
        self.run_until(target)
    }

    fn run_until(&mut self, target: u64) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.pop_due(target) {
            fired += 1;
            log::debug!(
                "t={}ms: {:?} timer fired for node {}",
                timer.at_ms,
                timer.kind,
                timer.owner
            );
            if self
                .dispatch(timer.owner, |controller, ctx| controller.on_timer(ctx, timer))
                .is_none()
            {
                log::debug!("node {}: timer owner is gone", timer.owner);
            }
        }
        self.timers.set_now(target);
        fired
    }

    /// Runs time forward until no one-shot timer is pending. Periodic timers
    /// that fall due along the way fire as usual.
    pub fn settle(&mut self) -> usize {
        let mut fired = 0;
        for _ in 0..SETTLE_LIMIT {
            let Some(due) = self.timers.next_one_shot_due() else {
                return fired;
            };
            fired += self.run_until(due);
        }
        log::warn!("timers kept re-arming; stopped settling after {} batches", SETTLE_LIMIT);
        fired
    }

    /// Draws one frame: every controller's foreground hook runs, then the
    /// dirty flag is consumed. Returns whether the canvas was redrawn.
    pub fn draw_frame(&mut self) -> bool {
        for id in self.controller_ids() {
            self.dispatch(id, |controller, ctx| controller.on_draw_foreground(ctx));
        }
        self.canvas.take_dirty()
    }

    // --- Persistence ---

    /// The node's saved record, including its controller's fields.
    pub fn serialize_node(&self, id: NodeId) -> Result<NodeRecord, SessionError> {
        let node = self.graph.node(id).ok_or(SessionError::NodeNotFound(id))?;
        let record = NodeRecord::from_node(node);
        let Some(controller) = self.controllers.get(&id) else {
            return Ok(record);
        };
        let mut map = record.to_map();
        controller.on_serialize(node, &mut map);
        Ok(NodeRecord::from_map(map)?)
    }

    /// Restores a controller's fields from a saved record.
    pub fn configure_controller(
        &mut self,
        id: NodeId,
        record: &Map<String, Value>,
    ) -> Result<(), SessionError> {
        if self.graph.node(id).is_none() {
            return Err(SessionError::NodeNotFound(id));
        }
        self.dispatch(id, |controller, ctx| controller.on_configure(ctx, record))
            .ok_or(SessionError::NotAController(id))??;
        Ok(())
    }

    /// Tears down every controller and empties the graph. The clock keeps running.
    pub fn clear(&mut self) {
        for id in self.controller_ids() {
            self.dispatch(id, |controller, ctx| controller.on_removed(ctx));
            self.timers.cancel_owned_by(id);
        }
        self.controllers.clear();
        self.graph = Graph::new();
        self.document_extra = Map::new();
        self.canvas.set_dirty();
    }

    /// Replaces the session's contents with a saved workflow.
    ///
    /// Nodes are created and configured first; links are restored only after
    /// every node exists, the way the host restores them. Controllers see the
    /// links when their deferred pass runs.
    pub fn load_document<W: IntoWorkflow>(
        &mut self,
        source: W,
    ) -> Result<LoadSummary, SessionError> {
        let doc = source.into_workflow()?;
        validate(&doc)?;
        self.clear();

        let mut summary = LoadSummary::default();
        self.graph.reserve_ids(doc.last_node_id, doc.last_link_id);
        for group in &doc.groups {
            self.graph.add_group(group.to_group());
        }
        self.restoring = true;
        for record in &doc.nodes {
            self.restore_node(record, &mut summary);
        }
        self.restoring = false;
        for record in &doc.links {
            if self.graph.insert_link(record.to_link()) {
                summary.links += 1;
            } else {
                log::warn!(
                    "link {}: cannot attach {}:{} -> {}:{}",
                    record.0,
                    record.1,
                    record.2,
                    record.3,
                    record.4
                );
                summary.skipped_links.push(record.0);
            }
        }
        self.document_extra = doc.extra;
        log::info!(
            "loaded {} node(s), {} controller(s), {} link(s)",
            summary.nodes,
            summary.controllers,
            summary.links
        );
        Ok(summary)
    }

    fn restore_node(&mut self, record: &NodeRecord, summary: &mut LoadSummary) {
        let id = record.id;
        if !self.graph.insert_node(Node::new(&record.type_tag).with_id(id)) {
            return;
        }
        summary.nodes += 1;
        if let Some(controller) = create_controller(&record.type_tag, &self.settings) {
            self.controllers.insert(id, controller);
            self.dispatch(id, |controller, ctx| controller.on_created(ctx));
            summary.controllers += 1;
        }

        let restores_values = self
            .controllers
            .get(&id)
            .is_none_or(|c| c.restores_widget_values());
        if let Some(node) = self.graph.node_mut(id) {
            record.apply_to(node);
            if restores_values {
                record.apply_widget_values(node);
            }
        }

        if !self.is_controller(id) {
            return;
        }
        if let Err(err) = self.configure_controller(id, &record.to_map()) {
            log::warn!("node {}: saved state rejected: {}", id, err);
            self.notices.push(Notice {
                node: id,
                message: err.to_string(),
            });
            if let SessionError::State(state) = err {
                summary.rejected.push((id, state));
            }
        }
    }

    pub fn load_str(&mut self, json: &str) -> Result<LoadSummary, SessionError> {
        self.load_document(json)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadSummary, SessionError> {
        let doc = WorkflowDocument::from_file(path)?;
        self.load_document(doc)
    }

    /// Writes the whole session back into the host's saved shape.
    pub fn to_document(&self) -> Result<WorkflowDocument, SessionError> {
        let nodes = self
            .graph
            .node_ids()
            .into_iter()
            .map(|id| self.serialize_node(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WorkflowDocument {
            last_node_id: self.graph.last_node_id(),
            last_link_id: self.graph.last_link_id(),
            nodes,
            links: self.graph.links().map(LinkRecord::from_link).collect(),
            groups: self.graph.groups().iter().map(GroupRecord::from_group).collect(),
            extra: self.document_extra.clone(),
        })
    }

    // --- Accessors ---

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Direct graph access. Edits made here do not notify controllers.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn classifier(&self) -> &RelayClassifier {
        &self.classifier
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
