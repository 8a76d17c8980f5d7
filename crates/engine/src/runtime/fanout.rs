// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parallel branches and matrix orchestrators.
//!
//! Each branch or matrix item becomes a parent-linked sub-job in the same
//! build, compiled from its target node. The orchestrator waits on each
//! sub-job's one-shot completion signal and folds the outcomes.

use super::{build_key, describe_requirement, env_text, Runtime};
use crate::compiler::{self, CompileOptions};
use crate::error::RuntimeError;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use weft_core::{
    BranchesPlan, Clock, Command, CommandKind, JobConfig, JobId, JobOutcome, JobStatus, MatrixPlan, NodeStatus,
};

/// Result of one branch or matrix item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubJobResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubJobResult {
    fn failed(name: String, job_id: Option<JobId>, error: impl Into<String>) -> Self {
        Self { name, job_id, success: false, exit_code: None, error: Some(error.into()) }
    }
}

/// Aggregate over all sub-jobs of one orchestrator command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutSummary {
    pub success: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<SubJobResult>,
}

impl FanOutSummary {
    fn fold(results: Vec<SubJobResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;
        Self { success: failure_count == 0, success_count, failure_count, results }
    }
}

/// One sub-job to launch
struct SubJobSpec {
    name: String,
    start_node: String,
    environment: HashMap<String, String>,
    /// Agent inherited by sub-job commands that name none
    agent_id: Option<String>,
}

/// How a set of sub-jobs is scheduled
#[derive(Debug, Clone, Copy)]
struct Schedule {
    /// 0 means all at once
    max_concurrency: usize,
    /// Report the aggregate at the first failure (unbounded only)
    fail_fast: bool,
    /// Skip remaining batches after a batch with a failure
    stop_after_failed_batch: bool,
}

impl<C: Clock> Runtime<C> {
    pub(crate) fn spawn_orchestrator(self: &Arc<Self>, job_id: JobId, cmd: Command) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_orchestrator(job_id, cmd).await;
        });
    }

    async fn run_orchestrator(self: Arc<Self>, job_id: JobId, cmd: Command) {
        let agent = cmd.agent_id.as_deref();
        let summary = match &cmd.kind {
            CommandKind::BranchesOrchestrator(plan) => self.run_branches(&job_id, plan, agent).await,
            CommandKind::MatrixOrchestrator(plan) => self.run_matrix(&job_id, plan, agent).await,
            _ => Err(RuntimeError::Orchestrator(format!("{} is not a fan-out command", cmd.node_id))),
        };
        let fail_fast = match &cmd.kind {
            CommandKind::BranchesOrchestrator(plan) => plan.fail_fast,
            CommandKind::MatrixOrchestrator(plan) => plan.fail_fast && !plan.continue_on_error,
            _ => false,
        };

        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                self.fail_job(&job_id, e.to_string(), None).await;
                return;
            }
        };
        tracing::info!(
            job_id = %job_id,
            node_id = %cmd.node_id,
            success = summary.success,
            success_count = summary.success_count,
            failure_count = summary.failure_count,
            "fan-out finished"
        );

        let Some(job) = self.jobs.get(&job_id) else { return };
        if !job.status.is_active() {
            tracing::debug!(job_id = %job_id, status = %job.status, "parent finished during fan-out");
            return;
        }
        let key = build_key(&job);
        let rendered = serde_json::to_string(&summary).unwrap_or_default();
        self.tracker.record_output(&key, &cmd.node_id, &rendered);
        if let Err(e) = self.jobs.update(&job_id, |j| j.append_output(&rendered)) {
            tracing::warn!(job_id = %job_id, error = %e, "parent job vanished");
            return;
        }

        if !summary.success && fail_fast {
            let error = format!(
                "{}: {} of {} failed",
                cmd.label,
                summary.failure_count,
                summary.success_count + summary.failure_count
            );
            self.fail_job(&job_id, error, None).await;
            return;
        }

        let status = if summary.success { NodeStatus::Completed } else { NodeStatus::Failed };
        self.mark_node(&key, &cmd.node_id, &cmd.label, status);
        if !summary.success {
            self.tracker.record_failure(&key, &format!("{}: {} failed", cmd.label, summary.failure_count));
        }
        let more = self.jobs.update(&job_id, |j| {
            let more = !j.is_last_command();
            if more {
                j.advance();
            }
            more
        });
        match more {
            Ok(true) => {
                if let Err(e) = self.drive(&job_id).await {
                    tracing::warn!(job_id = %job_id, error = %e, "failed to continue after fan-out");
                }
            }
            Ok(false) => self.complete_job(&job_id).await,
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "parent job vanished"),
        }
    }

    async fn run_branches(
        self: &Arc<Self>,
        parent: &JobId,
        plan: &BranchesPlan,
        agent: Option<&str>,
    ) -> Result<FanOutSummary, RuntimeError> {
        self.check_required_agent(agent)?;
        let specs = plan
            .branches
            .iter()
            .map(|b| SubJobSpec {
                name: b.name.clone(),
                start_node: b.target_node_id.clone(),
                environment: HashMap::new(),
                agent_id: agent.map(str::to_string),
            })
            .collect();
        let schedule = Schedule {
            max_concurrency: plan.max_concurrency,
            fail_fast: plan.fail_fast,
            stop_after_failed_batch: plan.fail_fast,
        };
        Ok(FanOutSummary::fold(self.run_sub_jobs(parent, specs, schedule).await))
    }

    async fn run_matrix(
        self: &Arc<Self>,
        parent: &JobId,
        plan: &MatrixPlan,
        agent: Option<&str>,
    ) -> Result<FanOutSummary, RuntimeError> {
        let Some(target) = &plan.target_node_id else {
            tracing::warn!(job_id = %parent, "matrix has no iteration target");
            return Ok(FanOutSummary::fold(Vec::new()));
        };
        self.check_required_agent(agent)?;
        let specs = plan
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| SubJobSpec {
                name: format!("{}[{i}]", plan.item_variable),
                start_node: target.clone(),
                environment: matrix_environment(&plan.item_variable, item),
                agent_id: agent.map(str::to_string),
            })
            .collect();
        let stop = plan.fail_fast && !plan.continue_on_error;
        let schedule = Schedule {
            max_concurrency: plan.max_concurrency,
            fail_fast: stop,
            stop_after_failed_batch: stop,
        };
        Ok(FanOutSummary::fold(self.run_sub_jobs(parent, specs, schedule).await))
    }

    /// A fan-out pinned to an agent fails up front when that agent is gone.
    fn check_required_agent(&self, agent: Option<&str>) -> Result<(), RuntimeError> {
        match agent {
            Some(_) if self.agents.find_available(agent).is_none() => {
                Err(RuntimeError::AgentUnavailable(describe_requirement(agent)))
            }
            _ => Ok(()),
        }
    }

    /// Launch sub-jobs under the concurrency cap, in order.
    async fn run_sub_jobs(self: &Arc<Self>, parent: &JobId, specs: Vec<SubJobSpec>, schedule: Schedule) -> Vec<SubJobResult> {
        if specs.is_empty() {
            return Vec::new();
        }
        let launch = |spec: SubJobSpec| {
            let this = Arc::clone(self);
            let parent = parent.clone();
            let name = spec.name.clone();
            let handle = tokio::spawn(async move { this.run_sub_job(&parent, spec).await });
            async move {
                handle
                    .await
                    .unwrap_or_else(|e| SubJobResult::failed(name, None, format!("sub-job task failed: {e}")))
            }
        };

        if schedule.max_concurrency == 0 {
            let mut pending: FuturesUnordered<_> = specs.into_iter().map(&launch).collect();
            let mut results = Vec::new();
            while let Some(result) = pending.next().await {
                let failed = !result.success;
                results.push(result);
                if failed && schedule.fail_fast {
                    tracing::info!(job_id = %parent, "fail-fast: reporting first failure");
                    break;
                }
            }
            return results;
        }

        let mut results = Vec::new();
        let mut specs = specs.into_iter().peekable();
        while specs.peek().is_some() {
            let batch: Vec<_> = specs.by_ref().take(schedule.max_concurrency).map(&launch).collect();
            let batch_results = futures_util::future::join_all(batch).await;
            let failed = batch_results.iter().any(|r| !r.success);
            results.extend(batch_results);
            if failed && schedule.stop_after_failed_batch && specs.peek().is_some() {
                tracing::info!(job_id = %parent, "stopping after failed batch");
                break;
            }
        }
        results
    }

    async fn run_sub_job(self: &Arc<Self>, parent_id: &JobId, spec: SubJobSpec) -> SubJobResult {
        let Some(parent) = self.jobs.get(parent_id) else {
            return SubJobResult::failed(spec.name, None, "parent job not found");
        };
        let key = build_key(&parent);
        let Some(graph) = self.tracker.graph(&key) else {
            return SubJobResult::failed(spec.name, None, "build is no longer running");
        };
        let mut opts = CompileOptions::default()
            .start_node(spec.start_node.clone())
            .outputs(self.tracker.outputs(&key));
        if let Some(trigger) = self.tracker.trigger(&key) {
            opts = opts.trigger(trigger);
        }
        let mut commands = match compiler::compile(&graph, &opts) {
            Ok(commands) => commands,
            Err(e) => return SubJobResult::failed(spec.name, None, e.to_string()),
        };
        if let Some(agent) = &spec.agent_id {
            for cmd in &mut commands {
                if cmd.agent_id.is_none() && !matches!(cmd.kind, CommandKind::Notification(_)) {
                    cmd.agent_id = Some(agent.clone());
                }
            }
        }

        let mut environment = parent.environment.clone();
        environment.extend(spec.environment);
        let config = JobConfig::new(parent.project_id.clone(), parent.build_number, commands)
            .environment(environment)
            .parent(parent_id.clone());
        let job_id = self.create_job(config);
        let rx = match self.jobs.watch(&job_id) {
            Ok(rx) => rx,
            Err(e) => return SubJobResult::failed(spec.name, Some(job_id), e.to_string()),
        };
        tracing::info!(job_id = %job_id, parent = %parent_id, name = %spec.name, "sub-job created");
        if let Err(e) = self.drive(&job_id).await {
            tracing::warn!(job_id = %job_id, error = %e, "sub-job did not start");
        }

        let outcome = self.await_outcome(&job_id, rx).await;
        SubJobResult {
            name: spec.name,
            job_id: Some(job_id),
            success: outcome.succeeded(),
            exit_code: outcome.exit_code,
            error: outcome.error,
        }
    }

    /// Wait for the completion signal; on timeout fall back to a bounded
    /// number of status polls before giving up on the job.
    async fn await_outcome(self: &Arc<Self>, job_id: &JobId, rx: oneshot::Receiver<JobOutcome>) -> JobOutcome {
        if let Ok(Ok(outcome)) = tokio::time::timeout(self.config.completion_timeout, rx).await {
            return outcome;
        }
        self.jobs.unwatch(job_id);
        tracing::warn!(job_id = %job_id, "completion wait timed out, polling status");

        for _ in 0..self.config.poll_attempts {
            if let Some(outcome) = self.terminal_outcome(job_id) {
                return outcome;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        if let Some(outcome) = self.terminal_outcome(job_id) {
            return outcome;
        }

        let error = "timed out waiting for sub-job completion";
        self.fail_job(job_id, error, None).await;
        JobOutcome { status: JobStatus::Failed, exit_code: None, error: Some(error.to_string()) }
    }

    fn terminal_outcome(&self, job_id: &JobId) -> Option<JobOutcome> {
        if let Some(job) = self.jobs.get(job_id) {
            return job.status.is_terminal().then(|| job.outcome());
        }
        match self.store.job_status(job_id) {
            Ok(Some(status)) if status.is_terminal() => {
                Some(JobOutcome { status, exit_code: None, error: None })
            }
            _ => None,
        }
    }
}

/// Environment for one matrix item: the item itself under `var`, and one
/// `<var>_<key>` per top-level property of object items.
pub(crate) fn matrix_environment(var: &str, item: &Value) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(var.to_string(), env_text(item));
    if let Value::Object(fields) = item {
        for (key, value) in fields {
            env.insert(format!("{var}_{key}"), env_text(value));
        }
    }
    env
}
