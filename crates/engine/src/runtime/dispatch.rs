// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driving a job through its commands

use super::{build_key, describe_requirement, Runtime};
use crate::error::RuntimeError;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use weft_core::{AgentId, Clock, Command, CommandKind, Job, JobId, JobStatus, NodeStatus};
use weft_wire::{ExecuteJob, Sequence, ServerMessage};

impl<C: Clock> Runtime<C> {
    /// Run the job's current command.
    ///
    /// Agent-bound commands are sent and the job then waits for agent
    /// events. Notifications run inline and the loop moves on. Fan-out
    /// commands are handed to a spawned orchestrator task. With no command
    /// left the job completes.
    pub(crate) fn drive(self: &Arc<Self>, job_id: &JobId) -> BoxFuture<'static, Result<(), RuntimeError>> {
        let this = Arc::clone(self);
        let job_id = job_id.clone();
        Box::pin(async move {
            loop {
                let job = this.jobs.get(&job_id).ok_or_else(|| RuntimeError::JobNotFound(job_id.clone()))?;
                if job.status.is_terminal() {
                    return Ok(());
                }
                let Some(cmd) = job.current_command().cloned() else {
                    this.complete_job(&job_id).await;
                    return Ok(());
                };
                match &cmd.kind {
                    CommandKind::Script { .. } | CommandKind::ParallelExecution { .. } => {
                        return this.dispatch_command(&job, &cmd).await;
                    }
                    CommandKind::Notification(plan) => {
                        this.start_server_side(&job, &cmd)?;
                        let key = build_key(&job);
                        match this.hooks.notifier.notify(&key, plan).await {
                            Ok(()) => tracing::info!(job_id = %job_id, node_id = %cmd.node_id, "notification sent"),
                            Err(e) => tracing::warn!(
                                job_id = %job_id,
                                node_id = %cmd.node_id,
                                error = %e,
                                "notification failed"
                            ),
                        }
                        this.mark_node(&key, &cmd.node_id, &cmd.label, NodeStatus::Completed);
                        this.jobs.update(&job_id, |j| {
                            j.advance();
                        })?;
                    }
                    CommandKind::BranchesOrchestrator(_) | CommandKind::MatrixOrchestrator(_) => {
                        this.start_server_side(&job, &cmd)?;
                        this.spawn_orchestrator(job_id.clone(), cmd);
                        return Ok(());
                    }
                }
            }
        })
    }

    /// Commands the server runs itself keep the job in `running`.
    fn start_server_side(&self, job: &Job, cmd: &Command) -> Result<(), RuntimeError> {
        let now = self.clock.epoch_ms();
        self.jobs.update(&job.id, |j| {
            j.begin_attempt();
            if j.status == JobStatus::Running {
                Ok(())
            } else {
                j.transition(JobStatus::Running, now)
            }
        })??;
        self.persist(&job.id);
        self.mark_node(&build_key(job), &cmd.node_id, &cmd.label, NodeStatus::Executing);
        Ok(())
    }

    /// Resolve an agent for `cmd` and send it.
    ///
    /// The job keeps its current agent when that agent still satisfies the
    /// command's requirement. Failure to find or reach an agent fails the job.
    async fn dispatch_command(self: &Arc<Self>, job: &Job, cmd: &Command) -> Result<(), RuntimeError> {
        let requirement = cmd.agent_id.as_deref();
        let agent = match &job.agent_id {
            Some(current) if self.agents.satisfies(current, requirement) => Some(current.clone()),
            _ => self.agents.find_available(requirement),
        };
        let Some(agent) = agent else {
            let reason = describe_requirement(requirement);
            self.fail_job(&job.id, format!("no available agent for '{}': {reason}", cmd.label), None)
                .await;
            return Err(RuntimeError::AgentUnavailable(reason));
        };

        let now = self.clock.epoch_ms();
        let msg = self.jobs.update(&job.id, |j| {
            j.transition(JobStatus::Dispatched, now)?;
            j.agent_id = Some(agent.clone());
            j.begin_attempt();
            Ok::<_, RuntimeError>(execute_message(j, cmd))
        })??;
        self.persist(&job.id);
        self.mark_node(&build_key(job), &cmd.node_id, &cmd.label, NodeStatus::Executing);

        if !self.dispatch_job(&agent, msg) {
            self.fail_job(&job.id, format!("failed to dispatch to agent {agent}"), None).await;
            return Err(RuntimeError::DispatchFailed { job: job.id.clone(), agent });
        }
        tracing::info!(job_id = %job.id, agent_id = %agent, node_id = %cmd.node_id, "command dispatched");
        Ok(())
    }

    /// Send an `execute_job` to an agent. False when the agent has no live
    /// connection or the send fails.
    pub fn dispatch_job(&self, agent_id: &AgentId, payload: ExecuteJob) -> bool {
        if !self.agents.is_connected(agent_id) {
            tracing::warn!(agent_id = %agent_id, job_id = %payload.job_id, "agent not connected");
            return false;
        }
        let job_id = payload.job_id.clone();
        let sent = self.agents.send(agent_id, ServerMessage::ExecuteJob(payload));
        if !sent {
            tracing::warn!(agent_id = %agent_id, job_id = %job_id, "send to agent failed");
        }
        sent
    }
}

/// Build the `execute_job` message for the job's current command.
pub(crate) fn execute_message(job: &Job, cmd: &Command) -> ExecuteJob {
    ExecuteJob {
        job_id: job.id.clone(),
        project_id: job.project_id.clone(),
        commands: cmd.agent_scripts(),
        environment: job.environment.clone(),
        working_directory: cmd.working_directory.clone(),
        timeout: cmd.timeout_secs,
        job_type: cmd.job_type().to_string(),
        retry: cmd.retry.clone(),
        sequence: Sequence {
            index: job.current_command,
            total: job.commands.len(),
            node_id: cmd.node_id.clone(),
            label: cmd.label.clone(),
        },
    }
}
