// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runtime::recovery::RESTART_ERROR;
use weft_core::{JobConfig, SystemClock};
use weft_storage::{MemoryStore, Store};

#[tokio::test]
async fn pinned_job_waits_for_its_agent_and_is_resent_once() {
    let ctx = setup(&["a1", "a2"]);
    let mut pinned = ctx.connect("a1").await;
    let mut other = ctx.connect("a2").await;
    let graph = Graph::new(vec![bash_on("a", "echo", "a1")], vec![]);

    let ticket = ctx.runtime.execute_graph("proj", graph, None).await.unwrap();
    pinned.next_execute().await;
    ctx.disconnect(&pinned).await;

    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.can_retry_on_reconnect);
    assert!(other.try_next().is_none());
    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);

    let mut back = ctx.connect("a1").await;
    let resent = back.next_execute().await;
    assert_eq!(resent.job_id, ticket.job_id);
    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Dispatched);
    assert!(!job.can_retry_on_reconnect);
    assert_eq!(job.error, None);

    // a second registration does not send it again
    ctx.send(&back, AgentMessage::Register(Default::default())).await;
    assert!(matches!(back.next().await, ServerMessage::Registered { .. }));
    assert!(back.try_next().is_none());

    ctx.complete(&back, &ticket.job_id).await;
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Completed);
}

#[tokio::test]
async fn unpinned_job_moves_to_another_agent() {
    let ctx = setup(&["a1", "a2"]);
    let mut first = ctx.connect("a1").await;
    let mut second = ctx.connect("a2").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    let original = first.next_execute().await;
    let msg = AgentMessage::JobOutput { job_id: ticket.job_id.clone(), output: "partial".into() };
    ctx.send(&first, msg).await;
    ctx.disconnect(&first).await;

    let moved = second.next_execute().await;
    assert_eq!(moved.job_id, ticket.job_id);
    assert_eq!(moved.environment, original.environment);
    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Dispatched);
    assert_eq!(job.agent_id, Some(AgentId::new("a2")));
    assert_eq!(job.output, "");

    ctx.complete(&second, &ticket.job_id).await;
    assert_eq!(ctx.wait_for_builds(1).await[0].status, BuildStatus::Success);
}

#[tokio::test]
async fn unpinned_job_fails_when_no_agent_is_left() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a", "b"]), None).await.unwrap();
    agent.next_execute().await;
    ctx.disconnect(&agent).await;

    let job = ctx.job(&ticket.job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!job.can_retry_on_reconnect);
    let builds = ctx.wait_for_builds(1).await;
    assert_eq!(builds[0].status, BuildStatus::Failure);
    assert_eq!(builds[0].nodes_executed, 1);
}

#[tokio::test]
async fn stale_session_disconnect_is_ignored() {
    let ctx = setup(&["a1"]);
    let old = ctx.connect("a1").await;
    let mut current = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    current.next_execute().await;
    ctx.disconnect(&old).await;

    assert!(ctx.runtime.agents().is_connected(&AgentId::new("a1")));
    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Dispatched);
}

#[tokio::test]
async fn cancelling_job_of_lost_agent_is_cancelled() {
    let ctx = setup(&["a1"]);
    let mut agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    agent.next_execute().await;
    ctx.runtime.cancel_job(&ticket.job_id).unwrap();
    ctx.disconnect(&agent).await;

    assert_eq!(ctx.job(&ticket.job_id).status, JobStatus::Cancelled);
}

#[tokio::test]
async fn restart_fails_orphaned_jobs() {
    let store = Arc::new(MemoryStore::new());
    let clock = SystemClock;
    let mut running = Job::new(JobConfig::new("proj", 4, vec![]), &clock);
    running.transition(JobStatus::Running, 1).unwrap();
    let mut done = Job::new(JobConfig::new("proj", 3, vec![]), &clock);
    done.transition(JobStatus::Running, 1).unwrap();
    done.transition(JobStatus::Completed, 2).unwrap();
    store.save_job(&running).unwrap();
    store.save_job(&done).unwrap();

    let ctx = setup_with_store(&[("a1", "a1")], store);
    assert_eq!(ctx.runtime.recover_on_startup().unwrap(), 1);

    let job = ctx.job(&running.id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(RESTART_ERROR));
    assert_eq!(ctx.store.job_status(&running.id).unwrap(), Some(JobStatus::Failed));
    assert_eq!(ctx.store.job_status(&done.id).unwrap(), Some(JobStatus::Completed));

    let builds = ctx.recorder.finished();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].key.to_string(), "proj#4");
    assert_eq!(builds[0].status, BuildStatus::Failure);
}
