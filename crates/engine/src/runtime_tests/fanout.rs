// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::{json, Value};
use weft_core::{MatrixConfig, Node, NodeKind};
use weft_wire::ExecuteJob;

fn item_is(exec: &ExecuteJob, value: &str) -> bool {
    exec.environment.get("item").map(String::as_str) == Some(value)
}

fn summary_of(ctx: &TestContext, job_id: &JobId) -> Value {
    serde_json::from_str(&ctx.job(job_id).output).unwrap()
}

/// fan -> {l, r, x}, then fan -> done
fn fan_graph(max_concurrency: Option<usize>, fail_fast: bool) -> Graph {
    Graph::new(
        vec![
            branches("fan", &["l", "r", "x"], max_concurrency, fail_fast),
            bash("l", ""),
            bash("r", ""),
            bash("x", ""),
            bash("done", ""),
        ],
        vec![edge_via("fan", "l", "l"), edge_via("fan", "r", "r"), edge_via("fan", "x", "x"), edge("fan", "done")],
    )
}

fn matrix_graph(config: MatrixConfig) -> Graph {
    Graph::new(
        vec![Node::new("m", NodeKind::ParallelMatrix(config)), bash("body", "run")],
        vec![edge_via("m", "iteration", "body")],
    )
}

#[tokio::test]
async fn branches_respect_the_concurrency_cap() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |_| false);

    let ticket = ctx.runtime.execute_graph("proj", fan_graph(Some(1), false), None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert_eq!(builds[0].status, BuildStatus::Success);
    assert_eq!(responder.max_in_flight(), 1);
    assert_eq!(responder.nodes(), vec!["l", "r", "x", "done"]);
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);

    let children = ctx.runtime.jobs().children(&ticket.job_id);
    assert_eq!(children.len(), 3);
    assert!(children.iter().all(|c| c.status == JobStatus::Completed && c.build_number == 1));
}

#[tokio::test]
async fn unbounded_branches_run_together() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |_| false);

    let ticket = ctx.runtime.execute_graph("proj", fan_graph(None, false), None).await.unwrap();
    ctx.wait_for_builds(1).await;

    let summary = summary_of(&ctx, &ticket.job_id);
    assert_eq!(summary["success"], json!(true));
    assert_eq!(summary["successCount"], json!(3));
    assert_eq!(responder.nodes().len(), 4);
}

#[tokio::test]
async fn branch_failure_without_fail_fast_continues() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |exec| exec.sequence.node_id == "x");

    let ticket = ctx.runtime.execute_graph("proj", fan_graph(Some(2), false), None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert!(responder.nodes().contains(&"done".to_string()));
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
    assert_eq!(builds[0].status, BuildStatus::Failure);
    let summary = summary_of(&ctx, &ticket.job_id);
    assert_eq!((summary["successCount"].clone(), summary["failureCount"].clone()), (json!(2), json!(1)));
}

#[tokio::test]
async fn branch_fail_fast_fails_the_parent() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |exec| exec.sequence.node_id == "l");

    let ticket = ctx.runtime.execute_graph("proj", fan_graph(None, true), None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert_eq!(builds[0].status, BuildStatus::Failure);
    let parent = ctx.job(&ticket.job_id);
    assert_eq!(parent.status, JobStatus::Failed);
    assert!(parent.error.unwrap_or_default().contains("failed"));
    assert!(!responder.nodes().contains(&"done".to_string()));
}

#[tokio::test]
async fn matrix_caps_batches_and_counts_failures() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |exec| item_is(exec, "2"));
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!(1), json!(2), json!(3)],
        max_concurrency: Some(2),
        ..Default::default()
    });

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    let summary = summary_of(&ctx, &ticket.job_id);
    assert_eq!(summary["success"], json!(false));
    assert_eq!(summary["successCount"], json!(2));
    assert_eq!(summary["failureCount"], json!(1));
    assert_eq!(summary["results"][1]["name"], json!("item[1]"));
    assert_eq!(summary["results"][1]["success"], json!(false));

    assert_eq!(responder.executed.lock().len(), 3);
    assert!(responder.max_in_flight() <= 2);
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
}

#[tokio::test]
async fn matrix_fail_fast_stops_after_the_failed_batch() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |exec| item_is(exec, "1"));
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!(1), json!(2), json!(3), json!(4)],
        max_concurrency: Some(2),
        fail_fast: true,
        ..Default::default()
    });

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    ctx.wait_for_builds(1).await;

    assert_eq!(responder.executed.lock().len(), 2);
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Failed);
}

#[tokio::test]
async fn matrix_continue_on_error_overrides_fail_fast() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |exec| item_is(exec, "1"));
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!(1), json!(2), json!(3)],
        max_concurrency: Some(1),
        fail_fast: true,
        continue_on_error: true,
        ..Default::default()
    });

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    ctx.wait_for_builds(1).await;

    assert_eq!(responder.executed.lock().len(), 3);
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
}

#[tokio::test]
async fn matrix_object_items_expand_into_environment() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |_| false);
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!({"os": "linux", "arch": "arm64"})],
        item_variable: "target".into(),
        ..Default::default()
    });

    ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    ctx.wait_for_builds(1).await;

    let executed = responder.executed.lock().clone();
    let env = &executed[0].environment;
    assert_eq!(env.get("target_os").map(String::as_str), Some("linux"));
    assert_eq!(env.get("target_arch").map(String::as_str), Some("arm64"));
    assert!(env.contains_key("target"));
    assert_eq!(env.get(BUILD_NUMBER_VAR).map(String::as_str), Some("1"));
}

#[tokio::test]
async fn matrix_without_body_succeeds_empty() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;
    let responder = ctx.auto_respond(agent, |_| false);
    let graph = Graph::new(
        vec![Node::new("m", NodeKind::ParallelMatrix(MatrixConfig { items: vec![json!(1)], ..Default::default() }))],
        vec![],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert_eq!(builds[0].status, BuildStatus::Success);
    assert!(responder.executed.lock().is_empty());
    assert_eq!(summary_of(&ctx, &ticket.job_id)["successCount"], json!(0));
}

#[test]
fn matrix_environment_keeps_scalars_raw() {
    let env = super::super::fanout::matrix_environment("v", &json!("plain"));
    assert_eq!(env.get("v").map(String::as_str), Some("plain"));
    assert_eq!(env.len(), 1);
}

#[tokio::test]
async fn matrix_pinned_to_an_agent_runs_only_there() {
    let ctx = setup(&["a1", "a2"]);
    let mut other = ctx.connect("a1").await;
    let pinned = ctx.connect("a2").await;
    let responder = ctx.auto_respond(pinned, |_| false);
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!(1), json!(2), json!(3)],
        agent_id: Some("a2".into()),
        ..Default::default()
    });

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert_eq!(builds[0].status, BuildStatus::Success);
    assert_eq!(responder.executed.lock().len(), 3);
    assert!(other.try_next().is_none());
    let children = ctx.runtime.jobs().children(&ticket.job_id);
    assert!(children.iter().all(|c| c.agent_id == Some(AgentId::new("a2"))));
}

#[tokio::test]
async fn pinned_fan_out_fails_when_its_agent_is_offline() {
    let ctx = setup(&["a1", "a2"]);
    let mut online = ctx.connect("a1").await;
    let graph = matrix_graph(MatrixConfig {
        items: vec![json!(1)],
        agent_id: Some("a2".into()),
        ..Default::default()
    });

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let builds = ctx.wait_for_builds(1).await;

    assert_eq!(builds[0].status, BuildStatus::Failure);
    let parent = ctx.job(&ticket.job_id);
    assert_eq!(parent.status, JobStatus::Failed);
    assert!(parent.error.unwrap_or_default().contains("a2"));
    assert!(ctx.runtime.jobs().children(&ticket.job_id).is_empty());
    assert!(online.try_next().is_none());
}
