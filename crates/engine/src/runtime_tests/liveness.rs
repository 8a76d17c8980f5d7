// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::monitor::run_liveness_monitor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft_core::AgentStatus;

#[tokio::test]
async fn silent_agent_is_taken_offline() {
    let ctx = setup(&["a1", "a2"]);
    let mut quiet = ctx.connect("a1").await;
    let mut chatty = ctx.connect("a2").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    quiet.next_execute().await;

    ctx.clock.advance(Duration::from_secs(45));
    let heartbeat = AgentMessage::Heartbeat { status: None, current_jobs: 0 };
    ctx.send(&chatty, heartbeat).await;
    ctx.clock.advance(Duration::from_secs(30));

    let report = ctx.runtime.sweep_liveness().await;
    assert_eq!(report.stale_agents, vec![AgentId::new("a1")]);
    assert!(!ctx.runtime.agents().is_connected(&AgentId::new("a1")));
    assert_eq!(ctx.runtime.agents().get(&AgentId::new("a1")).unwrap().status, AgentStatus::Offline);

    // its job moved to the agent that is still alive
    assert_eq!(chatty.next_execute().await.job_id, ticket.job_id);
}

#[tokio::test]
async fn sweep_evicts_old_finished_jobs() {
    let ctx = setup(&["a1"]);
    let agent = ctx.connect("a1").await;

    let ticket = ctx.runtime.execute_graph("proj", linear(&["a"]), None).await.unwrap();
    ctx.complete(&agent, &ticket.job_id).await;
    ctx.send(&agent, AgentMessage::Heartbeat { status: None, current_jobs: 0 }).await;

    assert_eq!(ctx.runtime.sweep_liveness().await.evicted_jobs, 0);
    ctx.clock.advance(ctx.runtime.config().job_retention + Duration::from_secs(1));
    ctx.send(&agent, AgentMessage::Heartbeat { status: None, current_jobs: 0 }).await;

    let report = ctx.runtime.sweep_liveness().await;
    assert_eq!(report.evicted_jobs, 1);
    assert!(report.stale_agents.is_empty());
    assert!(ctx.runtime.jobs().get(&ticket.job_id).is_none());
    // still answerable from storage
    assert_eq!(ctx.runtime.job(&ticket.job_id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn monitor_stops_on_shutdown() {
    let ctx = setup(&["a1"]);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_liveness_monitor(
        Arc::clone(&ctx.runtime),
        Duration::from_millis(5),
        shutdown.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}
