// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::test_support::*;
use weft_core::{Edge, ParamKind, ShellKind};

fn ids(commands: &[Command]) -> Vec<&str> {
    commands.iter().map(|c| c.node_id.as_str()).collect()
}

fn script_of(cmd: &Command) -> &str {
    match &cmd.kind {
        CommandKind::Script { script, .. } => script,
        other => panic!("expected script, got {other:?}"),
    }
}

#[test]
fn linear_chain_compiles_in_order() {
    let graph = Graph::new(
        vec![bash("c", "echo c"), bash("a", "echo a"), bash("b", "echo b")],
        vec![edge("a", "b"), edge_via("b", handle::EXECUTION, "c")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "b", "c"]);
}

#[test]
fn depth_first_from_fork() {
    let graph = Graph::new(
        vec![bash("a", ""), bash("b", ""), bash("b2", ""), bash("c", "")],
        vec![edge("a", "b"), edge("a", "c"), edge("b", "b2")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "b", "b2", "c"]);
}

#[test]
fn diamond_visits_join_once() {
    let graph = Graph::new(
        vec![bash("a", ""), bash("b", ""), bash("c", ""), bash("d", "")],
        vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "b", "d", "c"]);
}

#[test]
fn cycles_terminate() {
    let graph = Graph::new(vec![bash("a", ""), bash("b", "")], vec![edge("a", "b"), edge("b", "a")]);
    // every node has incoming control flow, so the first step-like node starts
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "b"]);
}

#[test]
fn outcome_edges_stop_static_compile() {
    let graph = Graph::new(
        vec![bash("a", ""), bash("ok", ""), bash("bad", "")],
        vec![edge_via("a", handle::SUCCESS, "ok"), edge_via("a", handle::FAILURE, "bad")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a"]);
}

#[test]
fn start_node_overrides_roots() {
    let graph = Graph::new(
        vec![bash("a", ""), bash("ok", ""), bash("after", "")],
        vec![edge_via("a", handle::SUCCESS, "ok"), edge("ok", "after")],
    );
    let opts = CompileOptions::default().start_node("ok");
    assert_eq!(ids(&compile(&graph, &opts).unwrap()), vec!["ok", "after"]);
}

#[test]
fn unknown_start_node_is_an_error() {
    let graph = Graph::new(vec![bash("a", "")], vec![]);
    let err = compile(&graph, &CompileOptions::default().start_node("zzz")).unwrap_err();
    assert!(matches!(err, CompileError::UnknownStartNode(id) if id == "zzz"));
}

#[yare::parameterized(
    true_branch  = { "1 < 2", "yes" },
    false_branch = { "1 > 2", "no" },
)]
fn conditional_follows_one_edge(expression: &str, expected: &str) {
    let graph = Graph::new(
        vec![bash("a", ""), conditional("c", expression), bash("yes", ""), bash("no", "")],
        vec![edge("a", "c"), edge_via("c", handle::TRUE, "yes"), edge_via("c", handle::FALSE, "no")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", expected]);
}

#[test]
fn conditional_sees_parameters() {
    let graph = Graph::new(
        vec![
            param("DEPLOY", ParamKind::Boolean, json!(true)),
            bash("a", ""),
            conditional("c", "$DEPLOY === true"),
            bash("ship", ""),
        ],
        vec![edge("a", "c"), edge_via("c", handle::TRUE, "ship")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "ship"]);
}

#[test]
fn malformed_condition_names_node() {
    let graph = Graph::new(vec![bash("a", ""), conditional("c", "1 <")], vec![edge("a", "c")]);
    let err = compile(&graph, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Condition { ref node, .. } if node == "c"));
    assert!(err.to_string().contains("conditional node c"));
}

#[test]
fn placeholders_resolve_in_scripts() {
    let graph = Graph::new(
        vec![
            param("VERSION", ParamKind::String, json!("2.1")),
            bash_with_inputs("a", "release ${VERSION} to $TARGET", &[("t", "TARGET")]),
        ],
        vec![],
    );
    let mut outputs = Outputs::new();
    outputs.insert("a:t".into(), json!("staging"));
    let commands = compile(&graph, &CompileOptions::default().outputs(outputs)).unwrap();
    assert_eq!(script_of(&commands[0]), "release 2.1 to staging");
}

#[test]
fn webhook_trigger_feeds_scripts() {
    let graph = Graph::new(
        vec![webhook_trigger("hook"), bash_with_inputs("a", "checkout ${REF}", &[("in", "REF")])],
        vec![edge("hook", "a"), data_edge("hook", "ref", "a", "in")],
    );
    let ctx = TriggerContext { body: json!({"ref": "v1"}), ..Default::default() };
    let commands = compile(&graph, &CompileOptions::default().trigger(ctx)).unwrap();
    assert_eq!(script_of(&commands[0]), "checkout v1");
}

#[test]
fn unknown_nodes_are_traversed() {
    let mut graph = Graph::new(vec![bash("a", ""), bash("b", "")], vec![edge("a", "x"), edge("x", "b")]);
    graph.nodes.push(weft_core::Node::new("x", NodeKind::Unknown("mystery".into())));
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "b"]);
}

#[test]
fn branches_compile_to_orchestrator() {
    let graph = Graph::new(
        vec![bash("a", ""), branches("fan", &["left", "right"], Some(2), true), bash("l", ""), bash("r", "")],
        vec![edge("a", "fan"), edge_via("fan", "left", "l"), edge_via("fan", "right", "r")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["a", "fan"]);
    let CommandKind::BranchesOrchestrator(plan) = &commands[1].kind else {
        panic!("expected orchestrator")
    };
    let targets: Vec<&str> = plan.branches.iter().map(|b| b.target_node_id.as_str()).collect();
    assert_eq!(targets, vec!["l", "r"]);
    assert_eq!(plan.max_concurrency, 2);
    assert!(plan.fail_fast);
}

#[test]
fn undeclared_branches_come_from_edges() {
    let graph = Graph::new(
        vec![branches("fan", &[], None, false), bash("l", ""), bash("done", "")],
        vec![edge_via("fan", "b1", "l"), edge("fan", "done")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["fan", "done"]);
    let CommandKind::BranchesOrchestrator(plan) = &commands[0].kind else {
        panic!("expected orchestrator")
    };
    assert_eq!(plan.branches[0].branch_id, "b1");
    assert_eq!(plan.max_concurrency, 0);
}

#[test]
fn matrix_iteration_is_not_followed() {
    let graph = Graph::new(
        vec![matrix("m", vec![json!(1), json!(2)], Some(1)), bash("body", ""), bash("after", "")],
        vec![edge_via("m", handle::ITERATION, "body"), edge("m", "after")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(ids(&commands), vec!["m", "after"]);
    let CommandKind::MatrixOrchestrator(plan) = &commands[0].kind else {
        panic!("expected matrix")
    };
    assert_eq!(plan.target_node_id.as_deref(), Some("body"));
    assert_eq!(plan.item_variable, "item");
}

#[test]
fn pinned_agent_and_shell_carry_through() {
    let graph = Graph::new(vec![bash_on("a", "uptime", "builder-1")], vec![]);
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    assert_eq!(commands[0].agent_id.as_deref(), Some("builder-1"));
    assert!(matches!(commands[0].kind, CommandKind::Script { shell: ShellKind::Bash, .. }));
}

#[test]
fn notification_is_rendered() {
    let graph = Graph::new(
        vec![param("WHO", ParamKind::String, json!("team")), bash("a", ""), notification("n", "hi $WHO")],
        vec![edge("a", "n")],
    );
    let commands = compile(&graph, &CompileOptions::default()).unwrap();
    let CommandKind::Notification(plan) = &commands[1].kind else { panic!("expected notification") };
    assert_eq!(plan.message, "hi team");
    assert_eq!(notifications(&commands).count(), 1);
    assert_eq!(scripts(&commands).count(), 1);
    assert_eq!(orchestrators(&commands).count(), 0);
}

#[yare::parameterized(
    empty_graph      = { vec![] },
    only_parameters  = { vec![param("A", ParamKind::String, json!("x")), param("B", ParamKind::Text, json!("y"))] },
)]
fn no_executable_nodes(nodes: Vec<weft_core::Node>) {
    let graph = Graph::new(nodes, Vec::<Edge>::new());
    assert!(matches!(
        compile(&graph, &CompileOptions::default()),
        Err(CompileError::NoExecutableNodes)
    ));
}

#[test]
fn lone_node_starts_even_if_excluded() {
    let graph = Graph::new(vec![notification("n", "hello")], vec![]);
    assert_eq!(ids(&compile(&graph, &CompileOptions::default()).unwrap()), vec!["n"]);
}

#[test]
fn fan_out_preferred_when_no_roots() {
    let graph = Graph::new(
        vec![bash("a", ""), branches("fan", &[], None, false)],
        vec![edge("a", "fan"), edge("fan", "a")],
    );
    assert_eq!(start_nodes(&graph, None).unwrap(), vec!["fan"]);
}
