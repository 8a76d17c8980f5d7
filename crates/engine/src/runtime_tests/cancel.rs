// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::{MatrixConfig, Node, NodeKind};
use weft_wire::ReportedStatus;

fn status(job_id: &JobId, status: ReportedStatus) -> AgentMessage {
    AgentMessage::JobStatus { job_id: job_id.clone(), status, message: None }
}

#[tokio::test]
async fn cancel_waits_for_agent_confirmation() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    agent.next_execute().await;
    ctx.runtime.cancel_job(&ticket.job_id).unwrap();

    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelling);
    assert_eq!(agent.next().await, ServerMessage::CancelJob { job_id: ticket.job_id.clone() });
    assert!(ctx.recorder.finished().is_empty());

    ctx.send(&agent, status(&ticket.job_id, ReportedStatus::Cancelled)).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelled);
    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Cancelled);
}

#[tokio::test]
async fn cancel_failed_resumes_the_job() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    agent.next_execute().await;
    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    ctx.send(&agent, status(&ticket.job_id, ReportedStatus::CancelFailed)).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Running);

    ctx.complete(&agent, &ticket.job_id).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
}

#[tokio::test]
async fn completion_while_cancelling_stops_before_next_command() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a", "b"]), None).await.unwrap();
    assert_eq!(agent.next_execute().await.sequence.node_id, "a");
    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    assert_eq!(agent.next().await, ServerMessage::CancelJob { job_id: ticket.job_id.clone() });

    ctx.complete(&agent, &ticket.job_id).await;
    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.current_command, 0);
    assert!(agent.try_next().is_none());

    // a late cancel_failed cannot revive it
    ctx.send(&agent, status(&ticket.job_id, ReportedStatus::CancelFailed)).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelled);

    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Cancelled);
    assert_eq!(builds[0].nodes_executed, 1);
    assert!(ctx.recorder.nodes_with(NodeStatus::Failed).is_empty());
}

#[tokio::test]
async fn output_is_accepted_while_cancelling() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    agent.next_execute().await;
    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    let msg = AgentMessage::JobOutput { job_id: ticket.job_id.clone(), output: "bye".into() };
    ctx.send(&agent, msg).await;

    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Cancelling);
    assert_eq!(job.output, "bye");
}

#[tokio::test]
async fn unreachable_agent_cancels_locally() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    agent.next_execute().await;
    drop(agent);

    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelled);
    assert_eq!(ctx.wait_for_builds(1).await[0].status, BuildStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_finished_job_is_a_no_op() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    ctx.complete(&agent, &ticket.job_id).await;

    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
}

#[tokio::test]
async fn cancelling_an_unknown_job_errors() {
    let ctx = setup(&["a1"]);
    let err = ctx.runtime.cancel_job(&JobId::from_string("job-missing")).unwrap_err();
    assert!(matches!(err, RuntimeError::JobNotFound(_)));
}

#[tokio::test]
async fn cancelling_a_parent_cancels_its_sub_jobs() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;
    let graph = Graph::new(
        vec![
            Node::new(
                "m",
                NodeKind::ParallelMatrix(MatrixConfig { items: vec![json!(1), json!(2)], ..Default::default() }),
            ),
            bash("body", ""),
        ],
        vec![edge_via("m", "iteration", "body")],
    );

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    let first = agent.next_execute().await;
    let second = agent.next_execute().await;

    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelled);
    for child in [&first.job_id, &second.job_id] {
        assert_eq!(ctx.job(child).status, JobStatus::Cancelling);
    }
    let mut cancelled = vec![];
    for _ in 0..2 {
        if let ServerMessage::CancelJob { job_id } = agent.next().await {
            cancelled.push(job_id);
        }
    }
    cancelled.sort();
    let mut expected = vec![first.job_id.clone(), second.job_id.clone()];
    expected.sort();
    assert_eq!(cancelled, expected);
    assert_eq!(ctx.wait_for_builds(1).await[0].status, BuildStatus::Cancelled);
}
