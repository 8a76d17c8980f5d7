// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::test_support::*;
use weft_core::ParamKind;

fn webhook_context() -> TriggerContext {
    let mut headers = serde_json::Map::new();
    headers.insert("x-event".into(), json!("push"));
    TriggerContext { body: json!({"ref": "main"}), headers, query: serde_json::Map::new() }
}

#[test]
fn parameter_node_wins_over_outputs() {
    let graph = Graph::new(
        vec![param("VERSION", ParamKind::String, json!("1.0")), bash_with_inputs("a", "", &[("in", "V")])],
        vec![data_edge("param-VERSION", "value", "a", "in")],
    );
    let mut outputs = Outputs::new();
    outputs.insert("param-VERSION".into(), json!("stale"));
    let map = ParamMap::build(&graph, None, Some(&outputs));
    let node = graph.node("a").unwrap();
    let bindings = map.bindings(&graph, node);
    assert_eq!(bindings[0], ("V".to_string(), json!("1.0")));
}

#[yare::parameterized(
    body_field = { "ref",     json!("main") },
    headers    = { "headers", json!({"x-event": "push"}) },
    body       = { "body",    json!({"ref": "main"}) },
)]
fn webhook_sockets(handle: &str, expected: serde_json::Value) {
    let graph = Graph::new(
        vec![webhook_trigger("hook"), bash_with_inputs("a", "", &[("in", "X")])],
        vec![edge("hook", "a"), data_edge("hook", handle, "a", "in")],
    );
    let ctx = webhook_context();
    let map = ParamMap::build(&graph, Some(&ctx), None);
    let bindings = map.bindings(&graph, graph.node("a").unwrap());
    assert_eq!(bindings, vec![("X".to_string(), expected)]);
}

#[test]
fn prior_output_prefers_handle_key() {
    let graph = Graph::new(
        vec![bash("build", ""), bash_with_inputs("deploy", "", &[("in", "ART")])],
        vec![data_edge("build", "artifact", "deploy", "in")],
    );
    let mut outputs = Outputs::new();
    outputs.insert("build".into(), json!("whole"));
    outputs.insert("build:artifact".into(), json!("app.tar"));
    let map = ParamMap::build(&graph, None, Some(&outputs));
    let bindings = map.bindings(&graph, graph.node("deploy").unwrap());
    assert_eq!(bindings, vec![("ART".to_string(), json!("app.tar"))]);
}

#[test]
fn unconnected_socket_falls_back_to_own_output() {
    let graph = Graph::new(vec![bash_with_inputs("a", "", &[("in", "X")])], vec![]);
    let mut outputs = Outputs::new();
    outputs.insert("a:in".into(), json!(7));
    let map = ParamMap::build(&graph, None, Some(&outputs));
    assert_eq!(map.bindings(&graph, graph.node("a").unwrap()), vec![("X".to_string(), json!(7))]);
}

#[test]
fn parameter_labels_are_always_bound() {
    let graph = Graph::new(
        vec![param("ENV", ParamKind::Choice, json!("prod")), bash("a", "")],
        vec![],
    );
    let map = ParamMap::build(&graph, None, None);
    assert_eq!(map.bindings(&graph, graph.node("a").unwrap()), vec![("ENV".to_string(), json!("prod"))]);
}
