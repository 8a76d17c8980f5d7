// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// a --success--> ok, a --failure--> bad
fn routed() -> Graph {
    Graph::new(
        vec![
            bash("a", "make"),
            bash_with_inputs("ok", "deploy ${V}", &[("in", "V")]),
            bash("bad", "page someone"),
        ],
        vec![
            edge_via("a", "success", "ok"),
            edge_via("a", "failure", "bad"),
            data_edge("a", "version", "ok", "in"),
        ],
    )
}

#[tokio::test]
async fn success_edge_starts_a_new_job_in_the_same_build() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", routed(), None).await.unwrap();
    let first = agent.next_execute().await;
    assert_eq!(first.sequence.node_id, "a");
    assert_eq!(first.sequence.total, 1);

    ctx.complete_with(&agent, &ticket.job_id, 0, r#"{"version": "1.4"}"#).await;
    let next = agent.next_execute().await;
    assert_ne!(next.job_id, ticket.job_id);
    assert_eq!(next.sequence.node_id, "ok");
    assert_eq!(script_of(&next), "deploy 1.4");
    assert_eq!(next.environment.get(BUILD_NUMBER_VAR).map(String::as_str), Some("1"));
    assert!(ctx.recorder.finished().is_empty());

    ctx.complete(&agent, &next.job_id).await;
    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].status, BuildStatus::Success);
    assert_eq!(builds[0].nodes_executed, 2);
    assert!(!ctx.recorder.nodes_with(NodeStatus::Executing).contains(&"bad".to_string()));
}

#[tokio::test]
async fn failure_edge_runs_handler_but_build_stays_failed() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", routed(), None).await.unwrap();
    agent.next_execute().await;
    ctx.complete_with(&agent, &ticket.job_id, 1, "").await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Failed);

    let next = agent.next_execute().await;
    assert_eq!(next.sequence.node_id, "bad");
    assert!(ctx.recorder.finished().is_empty());
    ctx.complete(&agent, &next.job_id).await;
    assert_eq!(ctx.job(&next.job_id).status, JobStatus::Completed);

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert_eq!(builds[0].message.as_deref(), Some("command exited with code 1"));
    assert_eq!(builds[0].nodes_executed, 2);
}

#[tokio::test]
async fn failure_without_failure_edge_fails_the_build() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(vec![bash("a", ""), bash("ok", "")], vec![edge_via("a", "success", "ok")]);

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    agent.next_execute().await;
    ctx.complete_with(&agent, &ticket.job_id, 3, "").await;

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert!(agent.try_next().is_none());
}

#[tokio::test]
async fn routed_compile_error_fails_the_build() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![bash("a", ""), conditional("c", "1 <"), bash("b", "")],
        vec![edge_via("a", "success", "c"), edge_via("c", "true", "b")],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    agent.next_execute().await;
    ctx.complete(&agent, &ticket.job_id).await;

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert!(builds[0].message.as_deref().unwrap_or_default().contains("failed to compile from c"));
}

#[tokio::test]
async fn condition_outputs_pick_the_branch() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![bash("a", ""), conditional("c", "1 < 2"), bash("yes", ""), bash("no", "")],
        vec![edge_via("a", "success", "c"), edge_via("c", "true", "yes"), edge_via("c", "false", "no")],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    agent.next_execute().await;
    ctx.complete(&agent, &ticket.job_id).await;
    assert_eq!(agent.next_execute().await.sequence.node_id, "yes");
}

#[tokio::test]
async fn routed_branch_without_commands_finishes_the_build() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![bash("a", ""), conditional("c", "1 > 2"), bash("yes", "")],
        vec![edge_via("a", "success", "c"), edge_via("c", "true", "yes")],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    agent.next_execute().await;
    ctx.complete(&agent, &ticket.job_id).await;

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Success);
    assert!(agent.try_next().is_none());
}
