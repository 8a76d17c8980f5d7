// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent result events, job completion, and graph routing on outcome

use super::{build_key, Runtime};
use crate::compiler::{self, CompileOptions};
use crate::error::RuntimeError;
use crate::hooks::BroadcastEvent;
use std::sync::Arc;
use weft_core::{BuildStatus, Clock, CommandKind, Job, JobConfig, JobId, JobStatus, NodeStatus};
use weft_wire::{ReportedStatus, ServerMessage};

impl<C: Clock> Runtime<C> {
    /// Append streamed output. Accepted while the job is active, including
    /// while a cancel is pending.
    pub fn handle_job_output(&self, job_id: &JobId, output: &str) -> Result<(), RuntimeError> {
        let now = self.clock.epoch_ms();
        let accepted = self.jobs.update(job_id, |j| {
            if j.status.is_terminal() {
                return false;
            }
            if j.status == JobStatus::Dispatched {
                let _ = j.transition(JobStatus::Running, now);
            }
            j.append_output(output);
            true
        })?;
        if accepted {
            self.hooks.broadcaster.broadcast(BroadcastEvent::JobOutput {
                job_id: job_id.clone(),
                chunk: output.to_string(),
            });
        } else {
            tracing::debug!(job_id = %job_id, "dropping output for finished job");
        }
        Ok(())
    }

    /// The current command finished. A non-zero exit is a failure.
    pub async fn handle_job_complete(
        self: &Arc<Self>,
        job_id: &JobId,
        exit_code: i32,
        output: Option<&str>,
    ) -> Result<(), RuntimeError> {
        if exit_code != 0 {
            self.handle_job_error(job_id, &format!("command exited with code {exit_code}"), Some(exit_code))
                .await;
            return Ok(());
        }

        let finished = self.jobs.update(job_id, |j| {
            if j.status.is_terminal() {
                return None;
            }
            let attempt_start = j.command_output_start.min(j.output.len());
            if let Some(output) = output {
                // final output only counts when nothing was streamed
                if j.output.len() == attempt_start {
                    j.append_output(output);
                }
            }
            j.exit_code = Some(exit_code);
            let attempt = j.output[attempt_start..].to_string();
            let cmd = j.current_command().cloned();
            let more = !j.is_last_command();
            // a pending cancel takes effect at the command boundary
            let stop = more && j.status == JobStatus::Cancelling;
            if more && !stop {
                j.advance();
            }
            Some((cmd, attempt, more, stop))
        })?;
        let Some((cmd, attempt, more, stop)) = finished else {
            tracing::debug!(job_id = %job_id, "completion for finished job ignored");
            return Ok(());
        };

        let job = self.jobs.get(job_id).ok_or_else(|| RuntimeError::JobNotFound(job_id.clone()))?;
        let key = build_key(&job);
        if let Some(cmd) = &cmd {
            self.tracker.record_output(&key, &cmd.node_id, &attempt);
            self.mark_node(&key, &cmd.node_id, &cmd.label, NodeStatus::Completed);
        }
        tracing::info!(job_id = %job_id, more, "command completed");

        if stop {
            tracing::info!(job_id = %job_id, "cancel pending, not starting next command");
            self.mark_cancelled(job_id, false)?;
        } else if more {
            self.persist(job_id);
            if let Err(e) = self.drive(job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "failed to continue job");
            }
        } else {
            self.complete_job(job_id).await;
        }
        Ok(())
    }

    /// Agent reported an error for the current command.
    pub async fn handle_job_error(self: &Arc<Self>, job_id: &JobId, error: &str, exit_code: Option<i32>) {
        tracing::warn!(job_id = %job_id, error, ?exit_code, "job error");
        self.fail_job(job_id, error, exit_code).await;
    }

    pub async fn handle_job_status(
        self: &Arc<Self>,
        job_id: &JobId,
        status: ReportedStatus,
        message: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let now = self.clock.epoch_ms();
        match status {
            ReportedStatus::Started => {
                self.jobs.update(job_id, |j| {
                    if j.status == JobStatus::Dispatched {
                        let _ = j.transition(JobStatus::Running, now);
                    }
                })?;
                self.persist(job_id);
            }
            ReportedStatus::Failed => {
                self.fail_job(job_id, message.unwrap_or("job failed"), None).await;
            }
            ReportedStatus::Cancelling => {
                self.jobs.update(job_id, |j| j.transition(JobStatus::Cancelling, now))??;
                self.persist(job_id);
            }
            ReportedStatus::Cancelled => self.mark_cancelled(job_id, true)?,
            ReportedStatus::CancelFailed => {
                tracing::warn!(job_id = %job_id, message, "agent could not cancel job");
                self.jobs.update(job_id, |j| {
                    if j.status == JobStatus::Cancelling {
                        let _ = j.transition(JobStatus::Running, now);
                    }
                })?;
                self.persist(job_id);
            }
        }
        Ok(())
    }

    /// All commands done: complete, signal the waiter, then route.
    pub(crate) async fn complete_job(self: &Arc<Self>, job_id: &JobId) {
        let now = self.clock.epoch_ms();
        let job = match self.jobs.update(job_id, |j| {
            j.transition(JobStatus::Completed, now)?;
            Ok::<_, RuntimeError>(j.clone())
        }) {
            Ok(Ok(job)) => job,
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "cannot complete job");
                return;
            }
        };
        self.persist(job_id);
        self.jobs.resolve(job_id, job.outcome());
        tracing::info!(job_id = %job_id, "job completed");

        if !job.is_sub_job() {
            let last = job.commands.last().map(|c| c.node_id.clone());
            self.route_after(&job, last.as_deref(), true).await;
        }
    }

    /// Fail the job, signal the waiter, and for top-level jobs follow the
    /// failure edge or close the build as failed.
    pub(crate) async fn fail_job(self: &Arc<Self>, job_id: &JobId, error: impl Into<String>, exit_code: Option<i32>) {
        let error = error.into();
        let now = self.clock.epoch_ms();
        let failed = self.jobs.update(job_id, |j| j.fail(error.clone(), exit_code, now).then(|| j.clone()));
        let job = match failed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!(job_id = %job_id, "job already finished");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "cannot fail job");
                return;
            }
        };
        self.persist(job_id);
        let key = build_key(&job);
        let node = job.current_command().map(|c| (c.node_id.clone(), c.label.clone()));
        if let Some((node_id, label)) = &node {
            self.mark_node(&key, node_id, label, NodeStatus::Failed);
        }
        self.jobs.resolve(job_id, job.outcome());
        tracing::warn!(job_id = %job_id, error = %error, "job failed");

        if !job.is_sub_job() {
            self.route_after(&job, node.as_ref().map(|(id, _)| id.as_str()), false).await;
        }
    }

    /// Follow the `success`/`failure` edge leaving `node_id`, or finish the
    /// build when there is none.
    async fn route_after(self: &Arc<Self>, job: &Job, node_id: Option<&str>, succeeded: bool) {
        let key = build_key(job);
        let Some(graph) = self.tracker.graph(&key) else {
            tracing::debug!(build = %key, "build already finished");
            return;
        };
        if !succeeded {
            // latched even when a failure handler runs next
            let message = job.error.clone().unwrap_or_else(|| "job failed".to_string());
            self.tracker.record_failure(&key, &message);
        }
        let target = node_id.and_then(|n| graph.outcome_target(n, succeeded));
        let Some(target) = target else {
            let status = if succeeded { BuildStatus::Success } else { BuildStatus::Failure };
            self.finish_build(&key, status, None);
            return;
        };

        tracing::info!(build = %key, from = ?node_id, to = target, succeeded, "following outcome edge");
        let mut opts = CompileOptions::default()
            .start_node(target.to_string())
            .outputs(self.tracker.outputs(&key));
        if let Some(trigger) = self.tracker.trigger(&key) {
            opts = opts.trigger(trigger);
        }
        let commands = match compiler::compile(&graph, &opts) {
            Ok(commands) => commands,
            Err(e) => {
                let message = format!("failed to compile from {target}: {e}");
                self.tracker.record_failure(&key, &message);
                self.finish_build(&key, BuildStatus::Failure, Some(message));
                return;
            }
        };
        if commands.is_empty() {
            let status = if self.tracker.is_failed(&key) { BuildStatus::Failure } else { BuildStatus::Success };
            self.finish_build(&key, status, None);
            return;
        }

        let mut config = JobConfig::new(job.project_id.clone(), job.build_number, commands)
            .environment(job.environment.clone());
        if let Some(agent) = &job.agent_id {
            config = config.agent_id(agent.clone());
        }
        let next = self.create_job(config);
        if let Err(e) = self.drive(&next).await {
            tracing::warn!(job_id = %next, error = %e, "routed job did not start");
        }
    }

    /// Ask for cancellation. Server-side and undispatched jobs cancel at once;
    /// jobs on an agent wait for the agent to confirm.
    pub fn cancel_job(&self, job_id: &JobId) -> Result<(), RuntimeError> {
        let job = self.jobs.get(job_id).ok_or_else(|| RuntimeError::JobNotFound(job_id.clone()))?;
        if job.status.is_terminal() {
            return Ok(());
        }
        for child in self.jobs.children(job_id) {
            if child.status.is_active() {
                self.cancel_job(&child.id)?;
            }
        }

        let on_agent = job.current_command().is_some_and(|c| {
            matches!(c.kind, CommandKind::Script { .. } | CommandKind::ParallelExecution { .. })
        }) && matches!(job.status, JobStatus::Dispatched | JobStatus::Running);
        let agent = job.agent_id.clone().filter(|_| on_agent);
        match agent {
            Some(agent) => {
                let now = self.clock.epoch_ms();
                self.jobs.update(job_id, |j| j.transition(JobStatus::Cancelling, now))??;
                self.persist(job_id);
                if self.agents.send(&agent, ServerMessage::CancelJob { job_id: job_id.clone() }) {
                    tracing::info!(job_id = %job_id, agent_id = %agent, "cancel requested");
                } else {
                    tracing::warn!(job_id = %job_id, agent_id = %agent, "agent unreachable, cancelling locally");
                    self.mark_cancelled(job_id, true)?;
                }
            }
            None => self.mark_cancelled(job_id, true)?,
        }
        Ok(())
    }

    /// `interrupted` marks the current command's node as failed; false when
    /// the cancel lands between commands.
    fn mark_cancelled(&self, job_id: &JobId, interrupted: bool) -> Result<(), RuntimeError> {
        let now = self.clock.epoch_ms();
        let job = self.jobs.update(job_id, |j| {
            j.transition(JobStatus::Cancelled, now)?;
            Ok::<_, RuntimeError>(j.clone())
        })??;
        self.persist(job_id);
        let key = build_key(&job);
        if let Some(cmd) = job.current_command().filter(|_| interrupted) {
            self.mark_node(&key, &cmd.node_id, &cmd.label, NodeStatus::Failed);
        }
        self.jobs.resolve(job_id, job.outcome());
        tracing::info!(job_id = %job_id, "job cancelled");
        if !job.is_sub_job() {
            self.finish_build(&key, BuildStatus::Cancelled, Some("cancelled".to_string()));
        }
        Ok(())
    }
}
