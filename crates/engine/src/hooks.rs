// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators the runtime reports to.
//!
//! Build bookkeeping, node status observers, UI broadcast and notification
//! delivery live outside the orchestrator. The daemon wires the default
//! implementations below; tests wire the recording fakes.

use crate::error::RuntimeError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use weft_core::{AgentId, BuildKey, BuildStatus, JobId, JobStatus, NodeStatus, NotificationPlan};
use weft_storage::Store;

/// Allocates build numbers and hears about finished builds
pub trait BuildLifecycle: Send + Sync + 'static {
    fn start_build(&self, project_id: &str) -> Result<u64, RuntimeError>;
    fn finish_build(&self, key: &BuildKey, status: BuildStatus, message: Option<&str>, nodes_executed: usize);
}

/// Per-node execution state changes
pub trait ExecutionObserver: Send + Sync + 'static {
    fn node_changed(&self, key: &BuildKey, node_id: &str, status: NodeStatus);
}

/// Events pushed to connected UIs
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    JobStatus { job_id: JobId, status: JobStatus },
    JobOutput { job_id: JobId, chunk: String },
    BuildFinished { key: BuildKey, status: BuildStatus },
    AgentConnected { agent_id: AgentId },
    AgentDisconnected { agent_id: AgentId },
}

pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(&self, event: BroadcastEvent);
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Delivers notification nodes
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, key: &BuildKey, plan: &NotificationPlan) -> Result<(), NotifyError>;
}

/// Bundle handed to the runtime
#[derive(Clone)]
pub struct Hooks {
    pub lifecycle: Arc<dyn BuildLifecycle>,
    pub observer: Arc<dyn ExecutionObserver>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub notifier: Arc<dyn Notifier>,
}

impl Hooks {
    /// Store-backed build numbering; everything else goes to the log.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self {
            lifecycle: Arc::new(StoreLifecycle { store }),
            observer: Arc::new(LogObserver),
            broadcaster: Arc::new(LogBroadcaster),
            notifier: Arc::new(LogNotifier),
        }
    }
}

pub struct StoreLifecycle {
    store: Arc<dyn Store>,
}

impl BuildLifecycle for StoreLifecycle {
    fn start_build(&self, project_id: &str) -> Result<u64, RuntimeError> {
        Ok(self.store.next_build_number(project_id)?)
    }

    fn finish_build(&self, key: &BuildKey, status: BuildStatus, message: Option<&str>, nodes_executed: usize) {
        tracing::info!(build = %key, %status, message, nodes_executed, "build finished");
    }
}

pub struct LogObserver;

impl ExecutionObserver for LogObserver {
    fn node_changed(&self, key: &BuildKey, node_id: &str, status: NodeStatus) {
        tracing::debug!(build = %key, node_id, %status, "node status");
    }
}

pub struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn broadcast(&self, event: BroadcastEvent) {
        tracing::trace!(?event, "broadcast");
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, key: &BuildKey, plan: &NotificationPlan) -> Result<(), NotifyError> {
        tracing::info!(
            build = %key,
            channel = %plan.channel,
            recipients = plan.recipients.len(),
            message = %plan.message,
            "notification"
        );
        Ok(())
    }
}
