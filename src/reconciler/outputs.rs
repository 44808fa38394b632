use super::{PortEditor, ReconcileReport};
use crate::graph::{Node, Widget, WidgetId, WidgetKind};
use crate::resolver::first_target;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Label of the always-open trailing output.
pub const OPEN_OUTPUT_LABEL: &str = "*";

/// Saved description of a generated control, keyed by output slot in the node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    #[serde(rename = "widgetIndex")]
    pub widget_index: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub value: Value,
    #[serde(default)]
    pub options: Value,
}

/// Bookkeeping of the output-replication shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicatorState {
    /// Number of outputs ever opened, persisted for the host.
    pub output_counter: u32,
    /// While locked, passes never add or remove ports or controls.
    pub locked: bool,
    /// The toggle that flips `locked`; always kept as the last widget.
    pub lock_widget: Option<WidgetId>,
    /// Output slot -> generated control.
    pub controls: BTreeMap<usize, WidgetId>,
    /// Control values read from a saved record, in parameter-widget order.
    pub pending_values: Option<Vec<Value>>,
    /// Control snapshots read from a saved record.
    pub pending_snapshots: Option<BTreeMap<usize, ControlSnapshot>>,
}

impl ReplicatorState {
    pub fn new() -> Self {
        Self {
            output_counter: 1,
            ..Default::default()
        }
    }

    /// Parameter widgets of the node: every widget except the lock toggle.
    pub fn parameter_widgets<'n>(&self, node: &'n Node) -> impl Iterator<Item = &'n Widget> {
        let lock = self.lock_widget;
        node.widgets.iter().filter(move |w| Some(w.id) != lock)
    }

    fn parameter_index(&self, node: &Node, widget: WidgetId) -> Option<usize> {
        self.parameter_widgets(node).position(|w| w.id == widget)
    }

    fn keep_lock_last(&self, node: &mut Node) {
        if let Some(lock) = self.lock_widget {
            node.move_widget_to_end(lock);
        }
    }

    /// Snapshots every generated control for persistence.
    pub fn snapshots(&self, node: &Node) -> BTreeMap<usize, ControlSnapshot> {
        self.controls
            .iter()
            .filter_map(|(slot, id)| {
                let widget = node.widget(*id)?;
                let index = node.widget_index(*id).map_or(-1, |i| i as i64);
                Some((
                    *slot,
                    ControlSnapshot {
                        widget_index: index,
                        name: widget.name.clone(),
                        widget_type: widget.kind.type_name().to_string(),
                        value: widget.value.clone(),
                        options: widget.kind.options(),
                    },
                ))
            })
            .collect()
    }
}

/// `<target title>.<target input name>` for the first link of an output.
fn target_label(editor: &PortEditor<'_>, slot: usize) -> Option<String> {
    let (link, target) = first_target(editor.graph().accessor(), editor.node_id(), slot)?;
    let input = target.inputs.get(link.target_slot)?;
    let title = if target.title.is_empty() {
        &target.type_tag
    } else {
        &target.title
    };
    let input_name = if input.name.is_empty() {
        format!("input_{}", link.target_slot)
    } else {
        input.name.clone()
    };
    Some(format!("{}.{}", title, input_name))
}

fn output_connected(editor: &PortEditor<'_>, slot: usize) -> bool {
    editor
        .node()
        .and_then(|n| n.outputs.get(slot))
        .is_some_and(|output| output.is_connected())
}

fn output_count(editor: &PortEditor<'_>) -> usize {
    editor.node().map_or(0, |n| n.outputs.len())
}

/// Creates the control mirroring the input fed by `slot`, restoring a saved value if any.
fn materialize_control(editor: &mut PortEditor<'_>, state: &mut ReplicatorState, slot: usize) {
    if state.controls.contains_key(&slot) {
        return;
    }
    let template = first_target(editor.graph().accessor(), editor.node_id(), slot)
        .and_then(|(link, target)| target.inputs.get(link.target_slot))
        .and_then(|input| input.param.as_ref())
        .map(|param| param.widget_template());
    let (Some((kind, initial)), Some(name)) = (template, target_label(editor, slot)) else {
        log::debug!("output {} feeds an input without a parameter definition", slot);
        return;
    };

    let saved_by_slot = state
        .pending_snapshots
        .as_ref()
        .and_then(|snapshots| snapshots.get(&slot))
        .filter(|snapshot| snapshot.name == name)
        .map(|snapshot| snapshot.value.clone());

    let Some(node) = editor.node_mut() else {
        return;
    };
    let id = node.add_widget(&name, kind, initial);
    state.keep_lock_last(node);
    state.controls.insert(slot, id);

    let saved = saved_by_slot.or_else(|| {
        let index = state.parameter_index(node, id)?;
        state.pending_values.as_ref()?.get(index).cloned()
    });
    if let (Some(value), Some(widget)) = (saved, node.widget_mut(id)) {
        widget.value = value;
    }
    log::debug!("node {}: generated control '{}' for output {}", node.id, name, slot);
}

/// Recreates controls from saved snapshots without touching the port list.
fn restore_locked_controls(editor: &mut PortEditor<'_>, state: &mut ReplicatorState) {
    let Some(snapshots) = state.pending_snapshots.take() else {
        return;
    };
    state.pending_values = None;
    let Some(node) = editor.node_mut() else {
        return;
    };
    for (slot, snapshot) in snapshots {
        if state.controls.contains_key(&slot) {
            continue;
        }
        let Some(kind) = WidgetKind::from_parts(&snapshot.widget_type, &snapshot.options) else {
            log::warn!(
                "node {}: cannot restore control '{}' of unknown type '{}'",
                node.id,
                snapshot.name,
                snapshot.widget_type
            );
            continue;
        };
        let id = node.add_widget(&snapshot.name, kind, snapshot.value);
        state.controls.insert(slot, id);
        state.keep_lock_last(node);
    }
}

fn relabel_outputs(editor: &mut PortEditor<'_>, report: &mut ReconcileReport) {
    let count = output_count(editor);
    for slot in 0..count {
        let label = if slot + 1 == count {
            Some(OPEN_OUTPUT_LABEL.to_string())
        } else {
            target_label(editor, slot)
        };
        if let Some(label) = label {
            if editor.set_output_name(slot, &label) {
                report.relabeled += 1;
            }
        }
    }
}

/// Output-replication shape: a trailing open output, one generated control per
/// connected output, and labels naming the downstream input.
pub fn stabilize_outputs(
    editor: &mut PortEditor<'_>,
    state: &mut ReplicatorState,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if editor.node().is_none() {
        return report;
    }

    if state.locked {
        restore_locked_controls(editor, state);
        relabel_outputs(editor, &mut report);
        editor.refresh_size();
        return report;
    }

    if output_count(editor) == 0 && editor.add_output(OPEN_OUTPUT_LABEL).is_some() {
        report.added += 1;
    }

    let count = output_count(editor);
    for slot in 0..count.saturating_sub(1) {
        if output_connected(editor, slot) {
            materialize_control(editor, state, slot);
        }
    }

    let last = count.saturating_sub(1);
    if count > 0 && output_connected(editor, last) {
        materialize_control(editor, state, last);
        state.output_counter += 1;
        if editor.add_output(OPEN_OUTPUT_LABEL).is_some() {
            report.added += 1;
        }
    }

    let count = output_count(editor);
    for slot in (0..count.saturating_sub(1)).rev() {
        if output_connected(editor, slot) {
            continue;
        }
        if let Some(widget) = state.controls.remove(&slot) {
            if let Some(node) = editor.node_mut() {
                node.remove_widget(widget);
            }
        }
        if editor.remove_output(slot) {
            report.removed += 1;
            state.controls = std::mem::take(&mut state.controls)
                .into_iter()
                .map(|(s, w)| if s > slot { (s - 1, w) } else { (s, w) })
                .collect();
        }
    }

    relabel_outputs(editor, &mut report);
    state.pending_values = None;
    state.pending_snapshots = None;
    editor.refresh_size();
    report
}
