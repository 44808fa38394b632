//! Save/load tests: controller fields, link restoration and document validation.
mod common;
use common::*;
use serde_json::json;
use switchyard::error::{DocumentError, SessionError, StateError};
use switchyard::prelude::*;

fn reload(session: &Session) -> (Session, LoadSummary) {
    let doc = session.to_document().expect("session serializes");
    let mut restored = Session::new();
    let summary = restored.load_document(doc).expect("document loads");
    (restored, summary)
}

fn widget_names(session: &Session, id: NodeId) -> Vec<String> {
    session
        .node(id)
        .map(|n| n.widgets.iter().map(|w| w.name.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn test_group_rule_survives_reload() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupRuleController::TYPE_NAME);
    session
        .set_rules_source(controller, r#"{"预览": ["A", "B"], "final": ["C"]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();
    session.select_rule(controller, "final").unwrap();

    let (mut restored, summary) = reload(&session);
    assert_eq!(summary.nodes, 7);
    assert_eq!(summary.controllers, 1);
    assert!(summary.rejected.is_empty());
    restored.settle();

    // Saved modes win over the default rule a fresh controller would apply.
    for id in members.iter().flatten() {
        assert_eq!(mode_of(&restored, *id), mode_of(&session, *id), "node {}", id);
    }
    assert_eq!(
        widget_value(&restored, controller, WidgetRole::RuleSelector),
        json!("final")
    );
    assert_eq!(
        restored.serialize_node(controller).unwrap(),
        session.serialize_node(controller).unwrap()
    );
}

#[test]
fn test_index_rule_restores_links_and_labels() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    let sources = feed_sources(&mut session, controller, 3);
    session
        .set_rules_source(controller, r#"{"r1": [1, 3], "r2": [2]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    let (mut restored, summary) = reload(&session);
    assert_eq!(summary.links, 3);
    assert!(summary.skipped_links.is_empty());
    restored.settle();

    assert_eq!(input_names(&restored, controller), input_names(&session, controller));
    let modes: Vec<Mode> = sources.iter().map(|s| mode_of(&restored, *s)).collect();
    assert_eq!(modes, vec![Mode::Active, Mode::Bypassed, Mode::Active]);

    let record = restored.serialize_node(controller).unwrap();
    assert_eq!(record.extra["selectedRule"], json!("r1"));
    assert_eq!(record.extra["rulesData"], json!({"r1": [1, 3], "r2": [2]}));

    restored.select_rule(controller, "r2").unwrap();
    assert_eq!(mode_of(&restored, sources[1]), Mode::Active);
    assert_eq!(mode_of(&restored, sources[0]), Mode::Bypassed);
}

#[test]
fn test_non_null_switch_grows_before_links_attach() {
    let json = r#"{
        "last_node_id": 3,
        "last_link_id": 2,
        "nodes": [
            {"id": 1, "type": "KSampler", "pos": [0, 0],
             "outputs": [{"name": "LATENT", "type": "LATENT", "links": [1]}]},
            {"id": 2, "type": "KSampler", "pos": [0, 200],
             "outputs": [{"name": "LATENT", "type": "LATENT", "links": [2]}]},
            {"id": 3, "type": "NonNullSwitchBen", "pos": [400, 0], "inputs_count": 4}
        ],
        "links": [[1, 1, 0, 3, 0, "LATENT"], [2, 2, 0, 3, 3, "LATENT"]]
    }"#;
    let mut session = Session::new();
    let summary = session.load_str(json).unwrap();
    assert_eq!(summary.links, 2);
    assert!(summary.skipped_links.is_empty());

    let node = session.node(3).unwrap();
    assert_eq!(node.inputs.len(), 4);
    assert_eq!(node.inputs[3].link, Some(2));

    // Open slots in the middle mean no growth; the connected tail keeps its slot.
    session.settle();
    assert_eq!(
        input_names(&session, 3),
        vec!["primary", "fallback_1", "fallback_2", "fallback_3"]
    );
    assert_eq!(session.node(3).unwrap().inputs[3].link, Some(2));
    let record = session.serialize_node(3).unwrap();
    assert_eq!(record.extra["inputs_count"], json!(4));
}

#[test]
fn test_saved_index_rules_with_zero_slot_survive_load() {
    let mut session = Session::new();
    let controller = place_controller(&mut session, IndexRuleController::TYPE_NAME);
    feed_sources(&mut session, controller, 2);
    session
        .set_rules_source(controller, r#"{"r1": [1], "none": [0, -1]}"#)
        .unwrap();
    session.refresh_rules(controller).unwrap();

    let (mut restored, summary) = reload(&session);
    assert!(summary.rejected.is_empty());
    restored.settle();
    let record = restored.serialize_node(controller).unwrap();
    assert_eq!(record.extra["rulesData"], json!({"r1": [1], "none": [0, -1]}));
}

#[test]
fn test_links_to_missing_slots_are_skipped() {
    let json = r#"{
        "nodes": [
            {"id": 1, "type": "KSampler",
             "outputs": [{"name": "LATENT", "type": "LATENT"}]},
            {"id": 2, "type": "SaveImage", "inputs": [{"name": "images", "type": "*"}]}
        ],
        "links": [[7, 1, 0, 2, 0, "LATENT"], [8, 1, 0, 2, 5, "LATENT"]]
    }"#;
    let mut session = Session::new();
    let summary = session.load_str(json).unwrap();
    assert_eq!(summary.links, 1);
    assert_eq!(summary.skipped_links, vec![8]);
    assert_eq!(session.graph().links().count(), 1);
}

#[test]
fn test_untouched_host_mode_codes_survive_save() {
    let json = r#"{
        "nodes": [
            {"id": 1, "type": "KSampler", "mode": 2},
            {"id": 2, "type": "KSampler", "mode": 2}
        ]
    }"#;
    let mut session = Session::new();
    session.load_str(json).unwrap();
    session.settle();
    assert_eq!(mode_of(&session, 1), Mode::Bypassed);

    // Only a node whose mode is written again gets a new code.
    session.graph_mut().set_mode(2, Mode::Active);
    let doc = session.to_document().unwrap();
    let codes: Vec<u8> = doc.nodes.iter().map(|n| n.mode).collect();
    assert_eq!(codes, vec![2, 0]);
}

#[test]
fn test_group_toggle_survives_reload() {
    let (mut session, members) = grouped_session();
    let controller = place_controller(&mut session, GroupToggleController::TYPE_NAME);
    session.select_group(controller, "B").unwrap();
    session.set_toggle(controller, false).unwrap();

    let (mut restored, _) = reload(&session);
    restored.settle();

    let record = restored.serialize_node(controller).unwrap();
    assert_eq!(record.extra["selectedGroupName"], json!("B"));
    assert_eq!(record.extra["toggle"], json!(false));
    assert_eq!(mode_of(&restored, members[1][0]), Mode::Bypassed);
    assert_eq!(mode_of(&restored, members[0][0]), Mode::Active);
}

#[test]
fn test_group_toggle_keeps_selection_of_missing_group() {
    let json = r#"{
        "nodes": [
            {"id": 1, "type": "GroupBypasserBen", "selectedGroupName": "Gone", "toggle": false}
        ]
    }"#;
    let mut session = Session::new();
    session.load_str(json).unwrap();
    session.settle();

    let record = session.serialize_node(1).unwrap();
    assert_eq!(record.extra["selectedGroupName"], json!("Gone"));
    assert_eq!(record.extra["toggle"], json!(false));
}

#[test]
fn test_distributor_restores_control_values() {
    let mut session = Session::new();
    let distributor = place_controller(&mut session, ParameterDistributor::TYPE_NAME);
    let width = session.add_node(int_consumer("Latent", "width"));
    let height = session.add_node(int_consumer("Latent 2", "height"));
    session.connect(distributor, 0, width, 0).unwrap();
    session.settle();
    session.connect(distributor, 1, height, 0).unwrap();
    session.settle();
    session
        .set_widget_value(distributor, "Latent.width", json!(768))
        .unwrap();

    let (mut restored, _) = reload(&session);
    restored.settle();

    assert_eq!(
        widget_names(&restored, distributor),
        vec!["Latent.width", "Latent 2.height", "lock parameters"]
    );
    let values: Vec<_> = restored
        .node(distributor)
        .unwrap()
        .widgets
        .iter()
        .map(|w| w.value.clone())
        .collect();
    assert_eq!(values, vec![json!(768), json!(512), json!(false)]);

    let record = restored.serialize_node(distributor).unwrap();
    assert_eq!(record.extra["outputCounter"], json!(3));
    assert_eq!(record.extra["paramsLocked"], json!(false));
}

#[test]
fn test_locked_distributor_restores_controls_without_links() {
    let mut session = Session::new();
    let distributor = place_controller(&mut session, ParameterDistributor::TYPE_NAME);
    let width = session.add_node(int_consumer("Latent", "width"));
    session.connect(distributor, 0, width, 0).unwrap();
    session.settle();
    session
        .set_widget_value(distributor, "Latent.width", json!(1024))
        .unwrap();
    session.set_locked(distributor, true).unwrap();

    let mut doc = session.to_document().unwrap();
    doc.links.clear();
    let mut restored = Session::new();
    restored.load_document(doc).unwrap();
    restored.settle();

    let node = restored.node(distributor).unwrap();
    assert_eq!(node.outputs.len(), 2);
    assert_eq!(
        widget_names(&restored, distributor),
        vec!["Latent.width", "lock parameters"]
    );
    assert_eq!(node.widgets[0].value, json!(1024));
    assert_eq!(
        restored.serialize_node(distributor).unwrap().extra["paramsLocked"],
        json!(true)
    );
}

#[test]
fn test_duplicate_node_ids_are_rejected() {
    let mut session = Session::new();
    let kept = session.add_node(producer("kept"));
    let err = session
        .load_str(r#"{"nodes": [{"id": 1, "type": "A"}, {"id": 1, "type": "B"}]}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Document(DocumentError::DuplicateNode { node_id: 1 })
    ));
    // A rejected document leaves the session untouched.
    assert!(session.node(kept).is_some());
}

#[test]
fn test_dangling_links_are_rejected() {
    let mut session = Session::new();
    let err = session
        .load_str(r#"{"nodes": [{"id": 1, "type": "A"}], "links": [[4, 1, 0, 9, 0, "*"]]}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Document(DocumentError::DanglingLink {
            link_id: 4,
            node_id: 9
        })
    ));
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let mut session = Session::new();
    assert!(matches!(
        session.load_str("{nodes"),
        Err(SessionError::Document(DocumentError::JsonParseError(_)))
    ));
}

#[test]
fn test_invalid_saved_field_keeps_defaults_and_notifies() {
    let json = r#"{
        "nodes": [
            {"id": 1, "type": "DynamicInputBypasser", "toggle": "maybe"},
            {"id": 2, "type": "KSampler"}
        ]
    }"#;
    let mut session = Session::new();
    let summary = session.load_str(json).unwrap();

    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.rejected.len(), 1);
    let (id, err) = &summary.rejected[0];
    assert_eq!(*id, 1);
    assert!(matches!(err, StateError::InvalidField { field: "toggle", .. }));

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("toggle"));
    assert!(session.is_controller(1));
    assert_eq!(widget_value(&session, 1, WidgetRole::Toggle), json!(true));
}

#[test]
fn test_load_accepts_json_values() {
    let mut session = Session::new();
    let summary = session
        .load_document(json!({
            "last_node_id": 10,
            "nodes": [{"id": 4, "type": "KSampler", "title": "Sampler", "mode": 4}],
            "version": 0.4
        }))
        .unwrap();
    assert_eq!(summary.nodes, 1);
    assert_eq!(session.node(4).unwrap().title, "Sampler");
    assert_eq!(mode_of(&session, 4), Mode::Bypassed);

    // Ids continue after the saved counter.
    let next = session.add_node(producer("new"));
    assert_eq!(next, 11);

    let doc = session.to_document().unwrap();
    assert_eq!(doc.extra["version"], json!(0.4));
    assert_eq!(doc.last_node_id, 11);
}

#[test]
fn test_loading_replaces_previous_contents() {
    let mut session = Session::new();
    let old = place_controller(&mut session, InputToggleController::TYPE_NAME);
    session.load_str(r#"{"nodes": []}"#).unwrap();

    assert!(session.node(old).is_none());
    assert!(session.controller_ids().is_empty());
    assert_eq!(session.timers().pending_count(), 0);
}

#[test]
fn test_settings_fill_missing_keys_with_defaults() {
    let settings = Settings::from_json(r#"{"stabilize_delay_ms": 250}"#).unwrap();
    assert_eq!(settings.stabilize_delay_ms, 250);
    assert_eq!(settings.width_decay_ms, Settings::default().width_decay_ms);
    assert_eq!(
        settings.relay_type_patterns,
        Settings::default().relay_type_patterns
    );
    assert!(matches!(
        Settings::from_json("42"),
        Err(DocumentError::JsonParseError(_))
    ));
}

#[test]
fn test_mode_report_lists_groups_then_loose_nodes() {
    let (mut session, members) = grouped_session();
    session.graph_mut().set_mode(members[1][0], Mode::Bypassed);
    let loose = session.add_node(producer("Loose").at(OUTSIDE.0, OUTSIDE.1));

    let report = ModeReport::format(session.graph());
    let mut expected = String::new();
    for (title, ids) in ["A", "B", "C"].iter().zip(&members) {
        let active = if *title == "B" { 1 } else { 2 };
        expected.push_str(&format!("[{} ({}/2 active)]\n", title, active));
        for (id, which) in ids.iter().zip(["first", "second"]) {
            let mode = if *id == members[1][0] { "bypassed" } else { "active" };
            expected.push_str(&format!(
                "  #{} {} {} <KSampler>: {}\n",
                id, title, which, mode
            ));
        }
    }
    expected.push_str(&format!("[ungrouped]\n  #{} Loose <KSampler>: active\n", loose));
    assert_eq!(report, expected);
}
