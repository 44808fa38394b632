//! Tests for port reconciliation and the width override.
mod common;
use common::*;
use switchyard::graph::Graph;
use switchyard::prelude::*;
use switchyard::reconciler::{
    FixedSlotLabels, LabelStyle, PortEditor, stabilize_fixed_minimum, stabilize_single_growth,
};
use switchyard::resolver::RelayClassifier;
use switchyard::scheduler::{TimerKind, TimerQueue};
use switchyard::width::WidthStabilizer;

struct Bench {
    graph: Graph,
    timers: TimerQueue,
    width: WidthStabilizer,
    node: NodeId,
}

impl Bench {
    fn new(node: Node) -> Self {
        let mut graph = Graph::new();
        let node = graph.add_node(node);
        Self {
            graph,
            timers: TimerQueue::new(),
            width: WidthStabilizer::new(32),
            node,
        }
    }

    fn editor(&mut self) -> PortEditor<'_> {
        PortEditor::new(&mut self.graph, &mut self.timers, &mut self.width, self.node)
    }

    fn inputs(&self) -> Vec<(String, bool)> {
        self.graph
            .node(self.node)
            .unwrap()
            .inputs
            .iter()
            .map(|i| (i.name.clone(), i.is_connected()))
            .collect()
    }

    fn width(&self) -> f32 {
        self.graph.node(self.node).unwrap().width()
    }

    /// Fires every decay timer due within `ms`.
    fn advance(&mut self, ms: u64) {
        let until = self.timers.now() + ms;
        while let Some(timer) = self.timers.pop_due(until) {
            if timer.kind == TimerKind::WidthDecay {
                self.width.on_decay(timer.token, &mut self.graph, self.node);
            }
        }
        self.timers.set_now(until);
    }
}

#[test]
fn test_width_held_during_rapid_additions() {
    let mut bench = Bench::new(Node::new("Switch"));
    let before = bench.width();

    for i in 0..5 {
        bench
            .editor()
            .add_input(&format!("a rather long input label number {}", i));
        assert_eq!(bench.width(), before, "width moved after addition {}", i);
    }
    assert_eq!(bench.timers.pending_for(bench.node, TimerKind::WidthDecay), 1);

    bench.advance(31);
    assert_eq!(bench.width(), before);

    bench.advance(1);
    let natural = bench.graph.node(bench.node).unwrap().natural_size()[0];
    assert_eq!(bench.width(), natural);
    assert!(natural > before);
    assert!(bench.width.override_width().is_none());
}

#[test]
fn test_width_decay_restarts_on_each_mutation() {
    let mut bench = Bench::new(Node::new("Switch"));
    let before = bench.width();

    bench.editor().add_input("a rather long input label");
    bench.advance(20);
    bench.editor().add_input("another rather long input label");
    bench.advance(20);
    assert_eq!(bench.width(), before);
    bench.advance(12);
    assert!(bench.width() > before);
}

#[test]
fn test_single_growth_adds_trailing_slot_when_full() {
    let mut bench = Bench::new(Node::new("Bypasser").with_input("", "*"));
    let source = bench.graph.add_node(producer("Loader"));
    bench.graph.connect(source, 0, bench.node, 0).unwrap();

    let classifier = RelayClassifier::default();
    let report = stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Indexed);
    assert_eq!(report.added, 1);
    assert_eq!(
        bench.inputs(),
        vec![("[1] Loader".to_string(), true), (String::new(), false)]
    );

    // Already canonical: a second pass changes nothing.
    let again = stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Indexed);
    assert_eq!(again, Default::default());
}

#[test]
fn test_single_growth_removes_unconnected_middle_slots() {
    let mut bench = Bench::new(
        Node::new("Bypasser")
            .with_input("", "*")
            .with_input("", "*")
            .with_input("", "*")
            .with_input("", "*"),
    );
    let a = bench.graph.add_node(producer("First"));
    let b = bench.graph.add_node(producer("Second"));
    bench.graph.connect(a, 0, bench.node, 0).unwrap();
    bench.graph.connect(b, 0, bench.node, 2).unwrap();

    let classifier = RelayClassifier::default();
    let report = stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Title);
    assert_eq!(report.removed, 1);
    assert_eq!(report.added, 0);
    assert_eq!(
        bench.inputs(),
        vec![
            ("First".to_string(), true),
            ("Second".to_string(), true),
            (String::new(), false)
        ]
    );
}

#[test]
fn test_single_growth_labels_follow_relays() {
    let mut bench = Bench::new(Node::new("Bypasser").with_input("", "*"));
    let source = bench.graph.add_node(producer("Upscaler"));
    let relay = bench.graph.add_node(reroute());
    bench.graph.connect(source, 0, relay, 0).unwrap();
    bench.graph.connect(relay, 0, bench.node, 0).unwrap();

    let classifier = RelayClassifier::default();
    stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Indexed);
    assert_eq!(bench.inputs()[0].0, "[1] Upscaler");
}

#[test]
fn test_single_growth_clears_label_of_unresolvable_source() {
    let mut bench = Bench::new(Node::new("Bypasser").with_input("", "*"));
    let source = bench.graph.add_node(producer("Loader"));
    bench.graph.connect(source, 0, bench.node, 0).unwrap();
    let classifier = RelayClassifier::default();
    stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Indexed);
    assert_eq!(bench.inputs()[0].0, "[1] Loader");

    // The slot still references a link, but the link is gone.
    bench.graph.node_mut(bench.node).unwrap().inputs[0].link = Some(999);
    let report = stabilize_single_growth(&mut bench.editor(), &classifier, LabelStyle::Indexed);
    assert_eq!(report.relabeled, 1);
    assert_eq!(bench.inputs()[0], (String::new(), true));
}

#[test]
fn test_label_styles() {
    assert_eq!(LabelStyle::Indexed.label(0, "Loader"), "[1] Loader");
    assert_eq!(LabelStyle::Indexed.label(2, ""), "[3] Input");
    assert_eq!(LabelStyle::Title.label(1, "Loader"), "Loader");
    assert_eq!(LabelStyle::Title.label(1, ""), "Input 2");
}

#[test]
fn test_fixed_minimum_grows_when_all_connected() {
    let labels = FixedSlotLabels::default();
    let mut bench = Bench::new(Node::new("Switch"));
    stabilize_fixed_minimum(&mut bench.editor(), &labels);
    assert_eq!(
        bench.inputs(),
        vec![("primary".to_string(), false), ("fallback_1".to_string(), false)]
    );

    let a = bench.graph.add_node(producer("a"));
    let b = bench.graph.add_node(producer("b"));
    bench.graph.connect(a, 0, bench.node, 0).unwrap();
    bench.graph.connect(b, 0, bench.node, 1).unwrap();
    let report = stabilize_fixed_minimum(&mut bench.editor(), &labels);
    assert_eq!(report.added, 1);
    assert_eq!(bench.inputs()[2], ("fallback_2".to_string(), false));
}

#[test]
fn test_fixed_minimum_does_not_grow_past_a_gap() {
    let labels = FixedSlotLabels::default();
    let mut bench = Bench::new(Node::new("Switch"));
    for slot in 0..4 {
        bench.editor().add_input(&labels.label(slot));
    }
    let a = bench.graph.add_node(producer("a"));
    let d = bench.graph.add_node(producer("d"));
    bench.graph.connect(a, 0, bench.node, 0).unwrap();
    bench.graph.connect(d, 0, bench.node, 3).unwrap();

    let report = stabilize_fixed_minimum(&mut bench.editor(), &labels);
    assert_eq!(report.added, 0);
    assert_eq!(report.removed, 0);
    assert_eq!(
        bench.inputs(),
        vec![
            ("primary".to_string(), true),
            ("fallback_1".to_string(), false),
            ("fallback_2".to_string(), false),
            ("fallback_3".to_string(), true),
        ]
    );
}

#[test]
fn test_fixed_minimum_trims_but_keeps_middle_gaps() {
    let labels = FixedSlotLabels::default();
    let mut bench = Bench::new(Node::new("Switch"));
    for slot in 0..5 {
        bench.editor().add_input(&labels.label(slot));
    }
    let a = bench.graph.add_node(producer("a"));
    let c = bench.graph.add_node(producer("c"));
    bench.graph.connect(a, 0, bench.node, 0).unwrap();
    bench.graph.connect(c, 0, bench.node, 2).unwrap();

    let report = stabilize_fixed_minimum(&mut bench.editor(), &labels);
    assert_eq!(report.removed, 1);
    assert_eq!(
        bench.inputs(),
        vec![
            ("primary".to_string(), true),
            ("fallback_1".to_string(), false),
            ("fallback_2".to_string(), true),
            ("fallback_3".to_string(), false),
        ]
    );
}

#[test]
fn test_distributor_generates_control_per_connected_output() {
    let mut session = Session::new();
    let distributor = place_controller(&mut session, ParameterDistributor::TYPE_NAME);
    let width = session.add_node(int_consumer("Latent", "width"));
    let height = session.add_node(int_consumer("Latent 2", "height"));

    session.connect(distributor, 0, width, 0).unwrap();
    session.settle();
    session.connect(distributor, 1, height, 0).unwrap();
    session.settle();

    let node = session.node(distributor).unwrap();
    let outputs: Vec<&str> = node.outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(outputs, vec!["Latent.width", "Latent 2.height", "*"]);
    let widgets: Vec<&str> = node.widgets.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(
        widgets,
        vec!["Latent.width", "Latent 2.height", "lock parameters"]
    );
    assert_eq!(node.widgets[0].value, serde_json::json!(512));
}

#[test]
fn test_distributor_removes_unconnected_middle_output() {
    let mut session = Session::new();
    let distributor = place_controller(&mut session, ParameterDistributor::TYPE_NAME);
    let first = session.add_node(int_consumer("First", "steps"));
    let second = session.add_node(int_consumer("Second", "seed"));
    session.connect(distributor, 0, first, 0).unwrap();
    session.settle();
    session.connect(distributor, 1, second, 0).unwrap();
    session.settle();

    session.disconnect_input(first, 0);
    session.settle();

    let node = session.node(distributor).unwrap();
    let outputs: Vec<&str> = node.outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(outputs, vec!["Second.seed", "*"]);
    let widgets: Vec<&str> = node.widgets.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(widgets, vec!["Second.seed", "lock parameters"]);
}

#[test]
fn test_locked_distributor_keeps_its_ports() {
    let mut session = Session::new();
    let distributor = place_controller(&mut session, ParameterDistributor::TYPE_NAME);
    let first = session.add_node(int_consumer("First", "steps"));
    session.connect(distributor, 0, first, 0).unwrap();
    session.settle();
    session.set_locked(distributor, true).unwrap();

    session.disconnect_input(first, 0);
    session.settle();

    let node = session.node(distributor).unwrap();
    assert_eq!(node.outputs.len(), 2);
    assert_eq!(node.widgets.len(), 2);
}
