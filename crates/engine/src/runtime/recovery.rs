// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphaned jobs: server restarts, lost agents, and agents coming back

use super::dispatch::execute_message;
use super::{build_key, Runtime};
use crate::error::RuntimeError;
use std::sync::Arc;
use weft_core::{AgentId, BuildStatus, Clock, CommandKind, Job, JobStatus, NodeStatus};

/// Error recorded on jobs that were active when the server stopped
pub const RESTART_ERROR: &str = "server restarted while job was running";

impl<C: Clock> Runtime<C> {
    /// Fail every job that was active in durable storage when the server
    /// stopped. Returns how many were failed.
    pub fn recover_on_startup(&self) -> Result<usize, RuntimeError> {
        let now = self.clock.epoch_ms();
        let mut recovered = 0;
        for mut job in self.store.load_jobs()? {
            if !job.status.is_active() {
                continue;
            }
            if !job.fail(RESTART_ERROR, None, now) {
                continue;
            }
            recovered += 1;
            let key = build_key(&job);
            tracing::warn!(job_id = %job.id, build = %key, "failing job orphaned by restart");
            let is_top_level = !job.is_sub_job();
            self.jobs.insert(job.clone());
            self.persist(&job.id);
            if is_top_level {
                self.hooks.lifecycle.finish_build(&key, BuildStatus::Failure, Some(RESTART_ERROR), 0);
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "recovered orphaned jobs");
        }
        Ok(recovered)
    }

    /// Handle the jobs of an agent that went away.
    ///
    /// Jobs pinned to that agent fail but stay retryable until it registers
    /// again. Other jobs move to any available agent with their original
    /// environment, or fail when there is none.
    pub async fn agent_lost(self: &Arc<Self>, agent_id: &AgentId) {
        for job in self.jobs.active_on(agent_id) {
            let Some(cmd) = job.current_command().cloned() else { continue };
            if !matches!(cmd.kind, CommandKind::Script { .. } | CommandKind::ParallelExecution { .. }) {
                continue;
            }
            if job.status == JobStatus::Cancelling {
                if let Err(e) = self.handle_job_status(&job.id, weft_wire::ReportedStatus::Cancelled, None).await {
                    tracing::warn!(job_id = %job.id, error = %e, "failed to cancel orphaned job");
                }
                continue;
            }
            match cmd.agent_id.as_deref() {
                Some(_) => self.hold_for_reconnect(&job, agent_id),
                None => self.reassign(&job, agent_id).await,
            }
        }
    }

    fn hold_for_reconnect(&self, job: &Job, agent_id: &AgentId) {
        let now = self.clock.epoch_ms();
        let error = format!("agent {agent_id} disconnected");
        let failed = self.jobs.update(&job.id, |j| {
            let failed = j.fail(error.clone(), None, now);
            if failed {
                j.can_retry_on_reconnect = true;
            }
            failed
        });
        if !matches!(failed, Ok(true)) {
            return;
        }
        self.persist(&job.id);
        let key = build_key(job);
        if let Some(cmd) = job.current_command() {
            self.mark_node(&key, &cmd.node_id, &cmd.label, NodeStatus::Failed);
        }
        tracing::warn!(job_id = %job.id, agent_id = %agent_id, "job held for agent reconnect");
        if !job.is_sub_job() {
            self.report_build_failure(&key, &error);
        }
    }

    async fn reassign(self: &Arc<Self>, job: &Job, lost: &AgentId) {
        let Some(agent) = self.agents.find_available(None).filter(|a| a != lost) else {
            self.fail_job(&job.id, format!("agent {lost} disconnected and no other agent is available"), None)
                .await;
            return;
        };
        let now = self.clock.epoch_ms();
        let msg = self.jobs.update(&job.id, |j| {
            j.rewind_attempt();
            j.transition(JobStatus::Dispatched, now)?;
            j.agent_id = Some(agent.clone());
            let cmd = j.current_command().cloned();
            Ok::<_, RuntimeError>(cmd.map(|c| execute_message(j, &c)))
        });
        let msg = match msg {
            Ok(Ok(Some(msg))) => msg,
            Ok(Ok(None)) => return,
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "cannot reassign job");
                return;
            }
        };
        self.persist(&job.id);
        if self.dispatch_job(&agent, msg) {
            tracing::info!(job_id = %job.id, from = %lost, to = %agent, "job reassigned");
        } else {
            self.fail_job(&job.id, format!("failed to reassign to agent {agent}"), None).await;
        }
    }

    /// Re-send jobs that were held for this agent. Each is sent once: the
    /// retry flag is cleared before sending.
    pub async fn agent_registered(self: &Arc<Self>, agent_id: &AgentId) {
        for job in self.jobs.retryable_for(agent_id) {
            let now = self.clock.epoch_ms();
            let msg = self.jobs.update(&job.id, |j| {
                if !j.can_retry_on_reconnect {
                    return Ok(None);
                }
                j.can_retry_on_reconnect = false;
                j.rewind_attempt();
                j.transition(JobStatus::Dispatched, now)?;
                j.error = None;
                j.exit_code = None;
                let cmd = j.current_command().cloned();
                Ok::<_, RuntimeError>(cmd.map(|c| execute_message(j, &c)))
            });
            let msg = match msg {
                Ok(Ok(Some(msg))) => msg,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) | Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "cannot redispatch job");
                    continue;
                }
            };
            self.persist(&job.id);
            let key = build_key(&job);
            if let Some(cmd) = job.current_command() {
                self.mark_node(&key, &cmd.node_id, &cmd.label, NodeStatus::Executing);
            }
            if self.dispatch_job(agent_id, msg) {
                tracing::info!(job_id = %job.id, agent_id = %agent_id, "job redispatched after reconnect");
            } else {
                self.fail_job(&job.id, format!("failed to redispatch to agent {agent_id}"), None).await;
            }
        }
    }
}
