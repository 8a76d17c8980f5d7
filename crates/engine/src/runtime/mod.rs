// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator runtime.
//!
//! `Runtime` owns the registries and drives jobs: dispatch to agents,
//! completion and routing, recovery after agent loss, and the two fan-out
//! orchestrators. The `impl` is split across the files of this module.

mod completion;
mod dispatch;
mod events;
mod fanout;
mod recovery;

pub use fanout::{FanOutSummary, SubJobResult};

use crate::agents::{AgentRegistry, KnownAgent};
use crate::compiler::{self, CompileError, CompileOptions};
use crate::error::RuntimeError;
use crate::hooks::{BroadcastEvent, Hooks};
use crate::jobs::JobRegistry;
use crate::tracker::ExecutionTracker;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use weft_core::{
    AgentId, BuildKey, BuildStatus, Clock, Command, Graph, Job, JobConfig, JobId,
    NodeKind, NodeStatus, TriggerContext,
};
use weft_storage::Store;

/// Environment variable carrying the build number into every job
pub const BUILD_NUMBER_VAR: &str = "WEFT_BUILD_NUMBER";
pub const PROJECT_ID_VAR: &str = "WEFT_PROJECT_ID";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long an orchestrator waits on a sub-job's completion signal
    pub completion_timeout: Duration,
    /// Status polling after the completion wait times out
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Terminal jobs stay in memory this long
    pub job_retention: Duration,
    pub heartbeat_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 10,
            job_retention: Duration::from_secs(60 * 60),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    weft_core::setters! {
        set {
            completion_timeout: Duration,
            poll_interval: Duration,
            poll_attempts: u32,
            job_retention: Duration,
            heartbeat_timeout: Duration,
        }
    }
}

/// Runtime dependencies
pub struct RuntimeDeps {
    pub store: Arc<dyn Store>,
    pub hooks: Hooks,
    pub agents: Vec<KnownAgent>,
}

/// What `execute_graph` reports back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTicket {
    pub job_id: JobId,
    pub build_number: u64,
    pub agent_id: Option<AgentId>,
    pub message: String,
}

pub struct Runtime<C: Clock> {
    agents: AgentRegistry<C>,
    jobs: JobRegistry,
    tracker: ExecutionTracker,
    store: Arc<dyn Store>,
    hooks: Hooks,
    config: RuntimeConfig,
    clock: C,
}

impl<C: Clock> Runtime<C> {
    pub fn new(deps: RuntimeDeps, config: RuntimeConfig, clock: C) -> Arc<Self> {
        Arc::new(Self {
            agents: AgentRegistry::new(deps.agents, clock.clone()),
            jobs: JobRegistry::new(),
            tracker: ExecutionTracker::new(),
            store: deps.store,
            hooks: deps.hooks,
            config,
            clock,
        })
    }

    pub fn agents(&self) -> &AgentRegistry<C> {
        &self.agents
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Look a job up in memory, then in durable storage.
    pub fn job(&self, id: &JobId) -> Option<Job> {
        if let Some(job) = self.jobs.get(id) {
            return Some(job);
        }
        match self.store.load_jobs() {
            Ok(jobs) => jobs.into_iter().find(|j| &j.id == id),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "failed to load jobs from store");
                None
            }
        }
    }

    /// Compile and start a graph as a new build.
    pub async fn execute_graph(
        self: &Arc<Self>,
        project_id: &str,
        graph: Graph,
        start_node: Option<&str>,
    ) -> Result<ExecutionTicket, RuntimeError> {
        let mut opts = CompileOptions::default();
        if let Some(start) = start_node {
            opts = opts.start_node(start.to_string());
        }
        self.start_build(project_id, graph, opts).await
    }

    /// Start a build at a trigger node, exposing its payload to placeholders.
    pub async fn execute_from_trigger(
        self: &Arc<Self>,
        project_id: &str,
        graph: Graph,
        trigger_node_id: &str,
        trigger: Option<TriggerContext>,
    ) -> Result<ExecutionTicket, RuntimeError> {
        match graph.node(trigger_node_id) {
            Some(node) if matches!(node.kind, NodeKind::Trigger(_)) => {}
            _ => return Err(RuntimeError::TriggerNotFound(trigger_node_id.to_string())),
        }
        let opts = CompileOptions::default()
            .start_node(trigger_node_id.to_string())
            .trigger(trigger.unwrap_or_default());
        self.start_build(project_id, graph, opts).await
    }

    async fn start_build(
        self: &Arc<Self>,
        project_id: &str,
        graph: Graph,
        opts: CompileOptions,
    ) -> Result<ExecutionTicket, RuntimeError> {
        let commands = compiler::compile(&graph, &opts)?;
        if commands.is_empty() {
            return Err(CompileError::NoExecutableNodes.into());
        }
        let agent = self.preflight_agent(&commands)?;

        let build_number = self.hooks.lifecycle.start_build(project_id)?;
        let key = BuildKey::new(project_id, build_number);
        let environment = build_environment(&key, &graph);
        self.tracker.start(&key, Arc::new(graph), opts.trigger, self.clock.epoch_ms());

        let mut config = JobConfig::new(project_id, build_number, commands).environment(environment);
        if let Some(agent) = agent {
            config = config.agent_id(agent);
        }
        let job_id = self.create_job(config);
        tracing::info!(job_id = %job_id, build = %key, "build started");

        self.drive(&job_id).await?;
        let agent_id = self.jobs.get(&job_id).and_then(|j| j.agent_id);
        Ok(ExecutionTicket {
            job_id,
            build_number,
            agent_id,
            message: format!("build #{build_number} started"),
        })
    }

    /// Check an agent exists for the first agent-bound command before any
    /// build state is created.
    fn preflight_agent(&self, commands: &[Command]) -> Result<Option<AgentId>, RuntimeError> {
        match compiler::scripts(commands).next() {
            Some(cmd) => {
                let requirement = cmd.agent_id.as_deref();
                self.agents
                    .find_available(requirement)
                    .map(Some)
                    .ok_or_else(|| RuntimeError::AgentUnavailable(describe_requirement(requirement)))
            }
            None => Ok(self.agents.find_available(None)),
        }
    }

    pub(crate) fn create_job(&self, config: JobConfig) -> JobId {
        let job = Job::new(config, &self.clock);
        let id = job.id.clone();
        self.jobs.insert(job);
        self.persist(&id);
        id
    }

    /// Mirror the job's current state to durable storage.
    pub(crate) fn persist(&self, job_id: &JobId) {
        let Some(job) = self.jobs.get(job_id) else { return };
        if let Err(e) = self.store.save_job(&job) {
            tracing::warn!(job_id = %job_id, error = %e, "failed to persist job");
        }
        self.hooks.broadcaster.broadcast(BroadcastEvent::JobStatus {
            job_id: job_id.clone(),
            status: job.status,
        });
    }

    pub(crate) fn mark_node(&self, key: &BuildKey, node_id: &str, label: &str, status: NodeStatus) {
        self.tracker.mark_node(key, node_id, label, status, self.clock.epoch_ms());
        self.hooks.observer.node_changed(key, node_id, status);
    }

    /// Settle a build: flush its node states and tell the lifecycle hook.
    pub(crate) fn finish_build(&self, key: &BuildKey, status: BuildStatus, message: Option<String>) {
        let Some(state) = self.tracker.finish(key, status, message, self.clock.epoch_ms()) else {
            return;
        };
        if let Err(e) = self.store.save_build(&state) {
            tracing::warn!(build = %key, error = %e, "failed to persist build state");
        }
        let nodes_executed = state.nodes_executed();
        self.hooks.lifecycle.finish_build(key, state.status, state.message.as_deref(), nodes_executed);
        self.hooks.broadcaster.broadcast(BroadcastEvent::BuildFinished {
            key: key.clone(),
            status: state.status,
        });
        tracing::info!(build = %key, status = %state.status, nodes_executed, "build finished");
    }

    /// Report a build failure without closing the build, so a job retried
    /// after reconnect can still route.
    pub(crate) fn report_build_failure(&self, key: &BuildKey, message: &str) {
        self.tracker.record_failure(key, message);
        let nodes_executed = self.tracker.nodes_executed(key);
        self.hooks.lifecycle.finish_build(key, BuildStatus::Failure, Some(message), nodes_executed);
    }
}

pub(crate) fn build_key(job: &Job) -> BuildKey {
    BuildKey::new(job.project_id.clone(), job.build_number)
}

fn describe_requirement(requirement: Option<&str>) -> String {
    match requirement {
        Some(agent) => format!("agent '{agent}' is not connected"),
        None => "no agents online".to_string(),
    }
}

/// Render a JSON value for an environment variable: strings raw,
/// objects and arrays as JSON, everything else via `to_string`.
pub(crate) fn env_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_environment(key: &BuildKey, graph: &Graph) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = graph
        .parameter_values()
        .iter()
        .map(|(label, value)| (label.clone(), env_text(value)))
        .collect();
    env.insert(BUILD_NUMBER_VAR.to_string(), key.build_number.to_string());
    env.insert(PROJECT_ID_VAR.to_string(), key.project_id.clone());
    env
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
