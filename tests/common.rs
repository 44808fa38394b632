//! Common test utilities for building graphs and sessions.
use switchyard::graph::ParamSpec;
use switchyard::prelude::*;

/// Canvas position far away from every fixture group.
#[allow(dead_code)]
pub const OUTSIDE: (f32, f32) = (5000.0, 5000.0);

/// A plain data-producing node with one output.
#[allow(dead_code)]
pub fn producer(title: &str) -> Node {
    Node::new("KSampler")
        .titled(title)
        .with_input("model", "MODEL")
        .with_output("LATENT", "LATENT")
}

/// A transparent relay node.
#[allow(dead_code)]
pub fn reroute() -> Node {
    Node::new("Reroute").with_input("", "*").with_output("", "*")
}

/// A consumer whose first input declares an integer parameter.
#[allow(dead_code)]
pub fn int_consumer(title: &str, input: &str) -> Node {
    Node::new("EmptyLatentImage").titled(title).with_param_input(
        input,
        "INT",
        ParamSpec::Int {
            default: Some(512),
            min: Some(64.0),
            max: Some(4096.0),
            step: Some(8.0),
        },
    )
}

/// Adds a group 400x400 wide whose top-left corner is at `(x, 0)`.
#[allow(dead_code)]
pub fn add_group(session: &mut Session, title: &str, x: f32) {
    session
        .graph_mut()
        .add_group(Group::new(title, Rect::new(x, 0.0, 400.0, 400.0)));
}

/// Adds a producer node placed inside the group anchored at `x`.
#[allow(dead_code)]
pub fn add_member(session: &mut Session, title: &str, x: f32) -> NodeId {
    session.add_node(producer(title).at(x + 40.0, 40.0))
}

/// Session with groups `A`, `B`, `C`, each holding two producers.
/// Returns the session and the member ids per group, in group order.
#[allow(dead_code)]
pub fn grouped_session() -> (Session, Vec<Vec<NodeId>>) {
    let mut session = Session::new();
    let mut members = Vec::new();
    for (i, title) in ["A", "B", "C"].iter().enumerate() {
        let x = i as f32 * 1000.0;
        add_group(&mut session, title, x);
        let first = add_member(&mut session, &format!("{} first", title), x);
        let second = session.add_node(producer(&format!("{} second", title)).at(x + 40.0, 200.0));
        members.push(vec![first, second]);
    }
    (session, members)
}

/// Places a controller outside every group and lets its deferred pass run.
#[allow(dead_code)]
pub fn place_controller(session: &mut Session, type_name: &str) -> NodeId {
    assert!(switchyard::controller::is_controller_type(type_name));
    let id = session.add_node(Node::new(type_name).at(OUTSIDE.0, OUTSIDE.1));
    session.settle();
    id
}

/// Connects `count` fresh producers to a single-growth controller, one per
/// trailing slot, settling after each connection. Returns the producers in slot order.
#[allow(dead_code)]
pub fn feed_sources(session: &mut Session, controller: NodeId, count: usize) -> Vec<NodeId> {
    let mut sources = Vec::new();
    for i in 0..count {
        let source = session.add_node(producer(&format!("Source {}", i + 1)).at(OUTSIDE.0, 0.0));
        let slot = session.node(controller).map_or(0, |n| n.inputs.len() - 1);
        session
            .connect(source, 0, controller, slot)
            .expect("ports are compatible");
        session.settle();
        sources.push(source);
    }
    sources
}

#[allow(dead_code)]
pub fn mode_of(session: &Session, id: NodeId) -> Mode {
    session.node(id).map(|n| n.mode).expect("node exists")
}

#[allow(dead_code)]
pub fn input_names(session: &Session, id: NodeId) -> Vec<String> {
    session
        .node(id)
        .map(|n| n.inputs.iter().map(|i| i.name.clone()).collect())
        .unwrap_or_default()
}

#[allow(dead_code)]
pub fn widget_value(session: &Session, node: NodeId, role: WidgetRole) -> serde_json::Value {
    let widget = session.role_widget(node, role).expect("controller has the widget");
    session
        .node(node)
        .and_then(|n| n.widget(widget))
        .map(|w| w.value.clone())
        .expect("widget exists")
}
