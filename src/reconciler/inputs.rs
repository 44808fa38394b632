use super::{LabelStyle, PortEditor, ReconcileReport};
use crate::resolver::{RelayClassifier, resolve_source};

/// Keeps exactly one trailing unconnected input; every other input is connected.
///
/// Connected inputs are relabelled from their resolved source on every pass,
/// since an upstream relay chain can be rewired without notifying this node.
/// A connected input whose source no longer resolves gets an empty label.
pub fn stabilize_single_growth(
    editor: &mut PortEditor<'_>,
    classifier: &RelayClassifier,
    style: LabelStyle,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let Some(node) = editor.node() else {
        return report;
    };

    let trailing_connected = node.inputs.last().map(|slot| slot.is_connected());
    match trailing_connected {
        Some(true) | None => {
            if editor.add_input("").is_some() {
                report.added += 1;
            }
        }
        Some(false) => {}
    }

    let len = editor.node().map_or(0, |n| n.inputs.len());
    for slot in (0..len.saturating_sub(1)).rev() {
        let connected = editor
            .node()
            .and_then(|n| n.inputs.get(slot))
            .is_some_and(|input| input.is_connected());
        if !connected && editor.remove_input(slot) {
            report.removed += 1;
        }
    }

    let len = editor.node().map_or(0, |n| n.inputs.len());
    for slot in 0..len.saturating_sub(1) {
        let connected = editor
            .node()
            .and_then(|n| n.inputs.get(slot))
            .is_some_and(|input| input.is_connected());
        let label = if connected {
            let graph = editor.graph().accessor();
            let source = resolve_source(graph, classifier, editor.node_id(), slot);
            match source.first().and_then(|id| graph.node_by_id(*id)) {
                Some(source) => style.label(slot, &source.title),
                None => String::new(),
            }
        } else {
            String::new()
        };
        if editor.set_input_name(slot, &label) {
            report.relabeled += 1;
        }
    }
    if let Some(last) = len.checked_sub(1) {
        if editor.set_input_name(last, "") {
            report.relabeled += 1;
        }
    }

    editor.refresh_size();
    report
}

/// Labels of the fixed-minimum shape: two fixed leading inputs, then numbered extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSlotLabels {
    pub primary: String,
    /// Prefix of every input after the first; the slot index is appended.
    pub fallback_prefix: String,
    pub minimum: usize,
}

impl Default for FixedSlotLabels {
    fn default() -> Self {
        Self {
            primary: "primary".to_string(),
            fallback_prefix: "fallback_".to_string(),
            minimum: 2,
        }
    }
}

impl FixedSlotLabels {
    pub fn label(&self, slot: usize) -> String {
        if slot == 0 {
            self.primary.clone()
        } else {
            format!("{}{}", self.fallback_prefix, slot)
        }
    }
}

/// Keeps at least `minimum` inputs, grows only when every input is connected,
/// and trims trailing inputs down to `max(minimum, last_connected + 2)`.
///
/// Unconnected inputs in the middle are kept: input order is meaningful here.
pub fn stabilize_fixed_minimum(
    editor: &mut PortEditor<'_>,
    labels: &FixedSlotLabels,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if editor.node().is_none() {
        return report;
    }
    while input_count(editor) < labels.minimum {
        let label = labels.label(input_count(editor));
        if editor.add_input(&label).is_none() {
            break;
        }
        report.added += 1;
    }

    let (all_connected, last_connected) = match editor.node() {
        Some(node) => (
            node.inputs.iter().all(|slot| slot.is_connected()),
            node.inputs.iter().rposition(|slot| slot.is_connected()),
        ),
        None => return report,
    };

    if all_connected {
        let label = labels.label(input_count(editor));
        if editor.add_input(&label).is_some() {
            report.added += 1;
        }
    } else {
        let target = labels
            .minimum
            .max(last_connected.map_or(0, |index| index + 2));
        while input_count(editor) > target {
            let last = input_count(editor) - 1;
            if !editor.remove_input(last) {
                break;
            }
            report.removed += 1;
        }
    }

    for slot in 0..input_count(editor) {
        if editor.set_input_name(slot, &labels.label(slot)) {
            report.relabeled += 1;
        }
    }

    editor.refresh_size();
    report
}

fn input_count(editor: &PortEditor<'_>) -> usize {
    editor.node().map_or(0, |n| n.inputs.len())
}
