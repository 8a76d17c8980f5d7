// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::{ParamKind, TriggerContext};

#[tokio::test]
async fn linear_graph_runs_commands_in_order() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a", "b"]), None).await.unwrap();
    assert_eq!(ticket.build_number, 1);
    assert_eq!(ticket.agent_id, Some(AgentId::new("a1")));
    assert_eq!(ticket.message, "build #1 started");

    let first = agent.next_execute().await;
    assert_eq!(first.job_id, ticket.job_id);
    assert_eq!(first.sequence.node_id, "a");
    assert_eq!((first.sequence.index, first.sequence.total), (0, 2));
    assert_eq!(first.job_type, "script");
    assert_eq!(first.environment.get(BUILD_NUMBER_VAR).map(String::as_str), Some("1"));
    assert_eq!(first.environment.get(PROJECT_ID_VAR).map(String::as_str), Some("proj"));

    ctx.complete(&agent, &ticket.job_id).await;
    let second = agent.next_execute().await;
    assert_eq!(second.job_id, ticket.job_id);
    assert_eq!(second.sequence.node_id, "b");
    assert_eq!(second.sequence.index, 1);

    ctx.complete(&agent, &ticket.job_id).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].key.to_string(), "proj#1");
    assert_eq!(builds[0].status, BuildStatus::Success);
    assert_eq!(builds[0].nodes_executed, 2);
}

#[tokio::test]
async fn build_numbers_increase_per_project() {
    let ctx = setup(&["a1"]);
    let _agent = ctx.connect("a1").await;

    let first = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    let second = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    let other = ctx.runtime.execute_graph("other", linear(&["a"]), None).await.unwrap();
    assert_eq!((first.build_number, second.build_number, other.build_number), (1, 2, 1));
}

#[tokio::test]
async fn parameters_become_environment_and_placeholders() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![param("VERSION", ParamKind::String, json!("2.1")), bash("a", "release ${VERSION}")],
        vec![],
    );

    ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let exec = agent.next_execute().await;
    assert_eq!(script_of(&exec), "release 2.1");
    assert_eq!(exec.environment.get("VERSION").map(String::as_str), Some("2.1"));
}

#[tokio::test]
async fn compile_error_leaves_no_trace() {
    let ctx = setup(&["a1"]);
    let _agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![bash("a", ""), conditional("c", "1 <"), bash("b", "")],
        vec![edge("a", "c"), edge_via("c", "true", "b")],
    );

    let err = ctx.runtime.execute_graph("proj", graph, None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Compile(_)), "got {err:?}");
    assert!(ctx.runtime.jobs().is_empty());
    assert!(ctx.recorder.finished().is_empty());

    // no build number was consumed
    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    assert_eq!(ticket.build_number, 1);
}

#[tokio::test]
async fn graph_without_executable_nodes_is_rejected() {
    let ctx = setup(&["a1"]);
    let graph = Graph::new(vec![param("X", ParamKind::String, json!("1"))], vec![]);

    let err = ctx.runtime.execute_graph("proj", graph, None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Compile(CompileError::NoExecutableNodes)), "got {err:?}");
}

#[tokio::test]
async fn no_agent_online_is_unavailable() {
    let ctx = setup(&["a1"]);

    let err = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::AgentUnavailable(_)), "got {err:?}");
    assert!(ctx.runtime.jobs().is_empty());
}

#[tokio::test]
async fn required_agent_is_never_substituted() {
    let ctx = setup(&["a1", "a2"]);
    let mut other = ctx.connect("a2").await;
    let graph = Graph::new(vec![bash_on("a", "echo", "a1")], vec![]);

    let err = ctx.runtime.execute_graph("proj", graph, None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::AgentUnavailable(ref m) if m.contains("a1")), "got {err:?}");
    assert!(other.try_next().is_none());
}

#[tokio::test]
async fn required_agent_receives_its_command() {
    let ctx = setup(&["a1", "a2"]);
    let _first = ctx.connect("a1").await;
    let mut pinned = ctx.connect("a2").await;
    let graph = Graph::new(vec![bash_on("a", "echo", "a2")], vec![]);

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    assert_eq!(ticket.agent_id, Some(AgentId::new("a2")));
    assert_eq!(pinned.next_execute().await.job_id, ticket.job_id);
}

#[tokio::test]
async fn local_requirement_maps_to_local_agent() {
    let ctx = setup_with(&[("a1", "builder"), ("box", weft_core::LOCAL_AGENT_NAME)]);
    let _builder = ctx.connect("a1").await;
    let mut local = ctx.connect("box").await;
    let graph = Graph::new(vec![bash_on("a", "echo", "local")], vec![]);

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    assert_eq!(ticket.agent_id, Some(AgentId::new("box")));
    assert_eq!(local.next_execute().await.job_id, ticket.job_id);
}

#[tokio::test]
async fn start_node_limits_the_run() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    ctx.runtime.execute_graph("proj", linear(&["a", "b", "c"]), Some("b")).await.unwrap();
    let exec = agent.next_execute().await;
    assert_eq!(exec.sequence.node_id, "b");
    assert_eq!(exec.sequence.total, 2);
}

#[tokio::test]
async fn trigger_payload_reaches_scripts() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![webhook_trigger("hook"), bash_with_inputs("a", "checkout ${REF}", &[("in", "REF")])],
        vec![edge("hook", "a"), data_edge("hook", "ref", "a", "in")],
    );
    let trigger = TriggerContext { body: json!({"ref": "v1"}), ..Default::default() };

    ctx.runtime.execute_from_trigger("proj", graph, "hook", Some(trigger)).await.unwrap();
    assert_eq!(script_of(&agent.next_execute().await), "checkout v1");
}

#[tokio::test]
async fn trigger_must_name_a_trigger_node() {
    let ctx = setup(&["a1"]);
    let _agent = ctx.connect("a1").await;

    let err = ctx.runtime.execute_from_trigger("proj", linear(&["a"]), "a", None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::TriggerNotFound(ref id) if id == "a"));
    let err = ctx.runtime.execute_from_trigger("proj", linear(&["a"]), "nope", None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::TriggerNotFound(_)));
}

#[tokio::test]
async fn nonzero_exit_fails_job_and_build() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a", "b"]), None).await.unwrap();
    ctx.complete_with(&agent, &ticket.job_id, 2, "boom").await;

    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.exit_code, Some(2));
    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert_eq!(builds[0].nodes_executed, 1);
    assert_eq!(ctx.recorder.nodes_with(NodeStatus::Failed), vec!["a"]);
}

#[tokio::test]
async fn job_error_fails_job() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    let msg = AgentMessage::JobError { job_id: ticket.job_id.clone(), error: "disk full".into(), exit_code: None };
    ctx.send(&agent, msg).await;

    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("disk full"));
}

#[tokio::test]
async fn streamed_output_accumulates() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    for chunk in ["one\n", "two\n"] {
        let msg = AgentMessage::JobOutput { job_id: ticket.job_id.clone(), output: chunk.into() };
        ctx.send(&agent, msg).await;
    }
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Running);

    // streamed output wins over the final message's copy
    ctx.complete_with(&agent, &ticket.job_id, 0, "one\ntwo\n").await;
    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.output, "one\ntwo\n");
}

#[tokio::test]
async fn started_status_moves_job_to_running() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Dispatched);
    let msg = AgentMessage::JobStatus {
        job_id: ticket.job_id.clone(),
        status: weft_wire::ReportedStatus::Started,
        message: None,
    };
    ctx.send(&agent, msg).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Running);
}

#[tokio::test]
async fn messages_for_another_agents_job_are_ignored() {
    let ctx = setup(&["a1", "a2"]);
    let _owner = ctx.connect("a1").await;
    let intruder = ctx.connect("a2").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    assert_eq!(ticket.agent_id, Some(AgentId::new("a1")));
    ctx.complete(&intruder, &ticket.job_id).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Dispatched);
}

#[tokio::test]
async fn notification_runs_on_the_server() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![bash("a", ""), notification("n", "build done"), bash("b", "")],
        vec![edge("a", "n"), edge("n", "b")],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    agent.next_execute().await;
    ctx.complete(&agent, &ticket.job_id).await;

    let next = agent.next_execute().await;
    assert_eq!(next.sequence.node_id, "b");
    let sent = ctx.recorder.notifications.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, "email");
    assert!(ctx.recorder.nodes_with(NodeStatus::Completed).contains(&"n".to_string()));
}

#[tokio::test]
async fn failed_notification_does_not_stop_the_job() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    *ctx.recorder.fail_notifications.lock() = true;
    let graph = Graph::new(vec![notification("n", "hi"), bash("b", "")], vec![edge("n", "b")]);

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let exec = agent.next_execute().await;
    assert_eq!(exec.sequence.node_id, "b");
    ctx.complete(&agent, &ticket.job_id).await;
    assert_eq!(ctx.wait_for_builds(1).await[0].status, BuildStatus::Success);
}

#[tokio::test]
async fn jobs_are_persisted() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    ctx.complete(&agent, &ticket.job_id).await;

    let stored = ctx.store.snapshot();
    let job = stored.jobs.values().find(|j| j.id == ticket.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(ctx.runtime.job(&ticket.job_id).unwrap().status, JobStatus::Completed);
}
