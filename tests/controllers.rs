//! End-to-end tests of every controller type, driven through a `Session`.
mod common;
use common::*;
use serde_json::json;
use switchyard::controller::{CONTROLLER_TYPES, REFRESH_BUTTON, RULE_SOURCE_WIDGET};
use switchyard::error::SessionError;
use switchyard::prelude::*;
use switchyard::scheduler::TimerKind;

#[test]
fn test_registry_knows_every_type() {
    assert_eq!(CONTROLLER_TYPES.len(), 6);
    let mut session = Session::new();
    for type_name in CONTROLLER_TYPES {
        let id = session.add_controller(type_name).unwrap();
        assert_eq!(session.controller_type(id), Some(*type_name));
    }
    assert!(matches!(
        session.add_controller("KSampler"),
        Err(SessionError::UnknownControllerType(_))
    ));
}

#[test]
fn test_plain_nodes_are_not_controllers() {
    let mut session = Session::new();
    let id = session.add_node(producer("plain"));
    assert!(!session.is_controller(id));
    assert!(matches!(
        session.select_rule(id, "x"),
        Err(SessionError::NotAController(_))
    ));
    assert!(matches!(
        session.set_toggle(999, true),
        Err(SessionError::NodeNotFound(999))
    ));
}

#[test]
fn test_group_rule_scenario() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);

    session
        .set_rules_source(controller, r#"{"预览": ["A", "B"], "final": ["C"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    for id in members[0].iter().chain(&members[1]) {
        assert_eq!(mode_of(&session, *id), Mode::Active);
    }
    for id in &members[2] {
        assert_eq!(mode_of(&session, *id), Mode::Bypassed);
    }
    assert_eq!(widget_value(&session, controller, WidgetRole::RuleSelector), json!("预览"));

    session.select_rule(controller, "final").unwrap();
    assert_eq!(mode_of(&session, members[0][0]), Mode::Bypassed);
    assert_eq!(mode_of(&session, members[2][1]), Mode::Active);
    // The controller itself sits outside every group.
    assert_eq!(mode_of(&session, controller), Mode::Active);
}

#[test]
fn test_group_rule_follows_moved_nodes() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session
        .set_rules_source(controller, r#"{"only A": ["A"], "only C": ["C"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    // Move an A member into C and re-apply.
    session.move_node(members[0][0], 2040.0, 40.0).unwrap();
    session.select_rule(controller, "only C").unwrap();
    assert_eq!(mode_of(&session, members[0][0]), Mode::Active);
    assert_eq!(mode_of(&session, members[0][1]), Mode::Bypassed);
}

#[test]
fn test_parse_error_keeps_rules_and_notifies() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session
        .set_rules_source(controller, r#"{"keep": ["A"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();
    session.take_notices();

    session
        .set_rules_source(controller, r#"{"keep": ["A"], "bad": "B"}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].node, controller);
    assert!(notices[0].message.contains("bad"));

    let record = session.serialize_node(controller).unwrap();
    assert_eq!(record.extra["rulesData"], json!({"keep": ["A"]}));
    assert_eq!(record.extra["selectedRule"], json!("keep"));
    assert_eq!(mode_of(&session, members[0][0]), Mode::Active);
}

#[test]
fn test_editing_source_alone_does_not_reparse() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session
        .set_widget_value(controller, RULE_SOURCE_WIDGET, json!(r#"{"new": []}"#))
        .unwrap();
    let record = session.serialize_node(controller).unwrap();
    assert!(record.extra["rulesData"].get("new").is_none());

    session.press_button(controller, REFRESH_BUTTON).unwrap();
    let record = session.serialize_node(controller).unwrap();
    assert_eq!(record.extra["rulesData"], json!({"new": []}));
}

#[test]
fn test_selecting_unknown_rule_changes_nothing() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session
        .set_rules_source(controller, r#"{"only A": ["A"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    session.select_rule(controller, "nope").unwrap();
    assert_eq!(widget_value(&session, controller, WidgetRole::RuleSelector), json!("only A"));
    assert_eq!(mode_of(&session, members[0][0]), Mode::Active);
    assert_eq!(mode_of(&session, members[1][0]), Mode::Bypassed);
}

#[test]
fn test_index_rule_scenario() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    let sources = feed_sources(&mut session, controller, 4);

    assert_eq!(
        input_names(&session, controller),
        vec!["[1] Source 1", "[2] Source 2", "[3] Source 3", "[4] Source 4", ""]
    );

    session
        .set_rules_source(controller, r#"{"r1": [1, 3], "r2": [2, 4]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();
    let modes: Vec<Mode> = sources.iter().map(|s| mode_of(&session, *s)).collect();
    assert_eq!(
        modes,
        vec![Mode::Active, Mode::Bypassed, Mode::Active, Mode::Bypassed]
    );

    session.select_rule(controller, "r2").unwrap();
    let modes: Vec<Mode> = sources.iter().map(|s| mode_of(&session, *s)).collect();
    assert_eq!(
        modes,
        vec![Mode::Bypassed, Mode::Active, Mode::Bypassed, Mode::Active]
    );
}

#[test]
fn test_index_rule_sources_resolve_through_relays() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    let source = session.add_node(producer("Behind relay").at(OUTSIDE.0, 0.0));
    let relay = session.add_node(reroute().at(OUTSIDE.0, 200.0));
    session.connect(source, 0, relay, 0).unwrap();
    session.connect(relay, 0, controller, 0).unwrap();
    session.settle();

    assert_eq!(input_names(&session, controller)[0], "[1] Behind relay");
    session
        .set_rules_source(controller, r#"{"off": []}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();
    assert_eq!(mode_of(&session, source), Mode::Bypassed);
    assert_eq!(mode_of(&session, relay), Mode::Active);
}

#[test]
fn test_burst_of_connections_reconciles_once() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);

    let first = session.add_node(producer("first"));
    let second = session.add_node(producer("second"));
    session.connect(first, 0, controller, 0).unwrap();
    session.advance(10);
    session.connect(second, 0, controller, 0).unwrap();
    session.advance(10);
    session.disconnect_input(controller, 0);
    session.connect(first, 0, controller, 0).unwrap();

    assert_eq!(session.timers().pending_for(controller, TimerKind::Stabilize), 1);
    // The window opened by the first notification closes at t+100.
    session.advance(79);
    assert_eq!(session.node(controller).unwrap().inputs.len(), 1);
    session.advance(1);
    assert_eq!(session.node(controller).unwrap().inputs.len(), 2);
    assert_eq!(session.timers().pending_for(controller, TimerKind::Stabilize), 0);
}

#[test]
fn test_disconnect_collapses_inputs() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    let sources = feed_sources(&mut session, controller, 3);

    session.remove_node(sources[1]).unwrap();
    session.settle();
    assert_eq!(
        input_names(&session, controller),
        vec!["[1] Source 1", "[2] Source 3", ""]
    );
}

#[test]
fn test_input_toggle_mixed_state() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, InputToggleController::TYPE_NAME);
    let sources = feed_sources(&mut session, controller, 3);
    assert_eq!(
        input_names(&session, controller),
        vec!["Source 1", "Source 2", "Source 3", ""]
    );

    session.set_toggle(controller, false).unwrap();
    assert!(sources.iter().all(|s| mode_of(&session, *s) == Mode::Bypassed));

    // Two sources switched back on behind the controller's back.
    session.graph_mut().set_mode(sources[0], Mode::Active);
    session.graph_mut().set_mode(sources[1], Mode::Active);
    // Re-plugging the last source runs a pass over the mixed sources.
    session.disconnect_input(controller, 2);
    session.connect(sources[2], 0, controller, 2).unwrap();
    session.settle();
    assert_eq!(widget_value(&session, controller, WidgetRole::Toggle), json!(false));

    session.set_toggle(controller, true).unwrap();
    assert!(sources.iter().all(|s| mode_of(&session, *s) == Mode::Active));
}

#[test]
fn test_input_toggle_follows_uniform_sources() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, InputToggleController::TYPE_NAME);
    let sources = feed_sources(&mut session, controller, 2);

    for source in &sources {
        session.graph_mut().set_mode(*source, Mode::Bypassed);
    }
    // Reconnecting triggers a pass, which re-reads the source modes.
    let extra = session.add_node(producer("extra").with_mode(Mode::Bypassed));
    session.connect(extra, 0, controller, 2).unwrap();
    session.settle();
    assert_eq!(widget_value(&session, controller, WidgetRole::Toggle), json!(false));
}

#[test]
fn test_group_toggle_applies_and_polls() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupToggleController::TYPE_NAME);
    assert_eq!(
        widget_value(&session, controller, WidgetRole::GroupSelector),
        json!("A")
    );

    session.select_group(controller, "B").unwrap();
    session.set_toggle(controller, false).unwrap();
    assert!(members[1].iter().all(|id| mode_of(&session, *id) == Mode::Bypassed));
    assert!(members[0].iter().all(|id| mode_of(&session, *id) == Mode::Active));

    // Renaming a group is only noticed by the poll.
    session.graph_mut().groups_mut()[1].title = "B renamed".to_string();
    session.advance(1000);
    let node = session.node(controller).unwrap();
    let selector = session
        .role_widget(controller, WidgetRole::GroupSelector)
        .unwrap();
    assert_eq!(
        node.widget(selector).unwrap().combo_values(),
        ["A", "B renamed", "C"]
    );
    assert_eq!(node.widget(selector).unwrap().value, json!("A"));
}

#[test]
fn test_group_toggle_with_no_groups() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, GroupToggleController::TYPE_NAME);
    assert_eq!(
        widget_value(&session, controller, WidgetRole::GroupSelector),
        json!("")
    );
    session.set_toggle(controller, false).unwrap();

    add_group(&mut session, "Late", 0.0);
    session.advance(1000);
    assert_eq!(
        widget_value(&session, controller, WidgetRole::GroupSelector),
        json!("Late")
    );
}

#[test]
fn test_removal_cancels_every_timer() {
    let mut session = Session::new();
    let toggle = session.add_controller(GroupToggleController::TYPE_NAME).unwrap();
    let index = session.add_controller(IndexRuleController::TYPE_NAME).unwrap();
    let source = session.add_node(producer("source"));
    session.connect(source, 0, index, 0).unwrap();
    assert!(session.timers().pending_count() > 0);

    session.remove_node(toggle).unwrap();
    session.remove_node(index).unwrap();
    assert_eq!(session.timers().pending_count(), 0);
    assert_eq!(session.advance(5000), 0);
}

#[test]
fn test_non_null_switch_shape() {
    let mut session = Session::new();
    let switch = place_controller(&mut session, NonNullSwitch::TYPE_NAME);
    assert_eq!(input_names(&session, switch), vec!["primary", "fallback_1"]);

    let a = session.add_node(producer("a"));
    let b = session.add_node(producer("b"));
    session.connect(a, 0, switch, 0).unwrap();
    session.connect(b, 0, switch, 1).unwrap();
    session.settle();
    assert_eq!(
        input_names(&session, switch),
        vec!["primary", "fallback_1", "fallback_2"]
    );

    session.disconnect_input(switch, 0);
    session.settle();
    assert_eq!(
        input_names(&session, switch),
        vec!["primary", "fallback_1", "fallback_2"]
    );
    session.disconnect_input(switch, 1);
    session.settle();
    assert_eq!(input_names(&session, switch), vec!["primary", "fallback_1"]);
}

#[test]
fn test_title_change_renames_selector_on_draw() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    session.draw_frame();

    session.set_title(controller, "Pick stages").unwrap();
    assert!(session.draw_frame());
    let selector = session
        .role_widget(controller, WidgetRole::RuleSelector)
        .unwrap();
    let node = session.node(controller).unwrap();
    assert_eq!(node.widget(selector).unwrap().name, "Pick stages");

    session.set_title(controller, "").unwrap();
    session.draw_frame();
    let node = session.node(controller).unwrap();
    assert_eq!(node.widget(selector).unwrap().name, "Bypass nodes");
    assert!(!session.draw_frame());
}

#[test]
fn test_mode_changes_mark_canvas_dirty() {
    let (mut session, _) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session.draw_frame();
    let redraws = session.canvas().redraws();

    session
        .set_rules_source(controller, r#"{"x": ["A"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();
    assert!(session.canvas().is_dirty());
    assert!(session.draw_frame());
    assert_eq!(session.canvas().redraws(), redraws + 1);
}

#[test]
fn test_session_builder_settings() {
    let session = Session::builder()
        .with_stabilize_delay(10)
        .with_width_decay(5)
        .with_group_poll_interval(250)
        .with_deferred_restore(20)
        .with_relay_pattern("Passthrough")
        .build();
    let settings = session.settings();
    assert_eq!(settings.stabilize_delay_ms, 10);
    assert_eq!(settings.width_decay_ms, 5);
    assert_eq!(settings.group_poll_interval_ms, 250);
    assert_eq!(settings.deferred_restore_ms, 20);
    assert!(session
        .classifier()
        .is_relay(&Node::new("MyPassthrough")));
    assert!(session.classifier().is_relay(&Node::new("Reroute")));
}

#[test]
fn test_custom_stabilize_delay_is_used() {
    let mut session = Session::builder().with_stabilize_delay(10).build();
    let controller = place_controller(&mut session, InputToggleController::TYPE_NAME);
    let source = session.add_node(producer("source"));
    session.connect(source, 0, controller, 0).unwrap();
    session.advance(9);
    assert_eq!(session.node(controller).unwrap().inputs.len(), 1);
    session.advance(1);
    assert_eq!(session.node(controller).unwrap().inputs.len(), 2);
}
