// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat liveness sweep

use crate::runtime::Runtime;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft_core::{AgentId, Clock};

/// What one sweep did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub stale_agents: Vec<AgentId>,
    pub evicted_jobs: usize,
}

impl<C: Clock> Runtime<C> {
    /// Take stale agents offline, handle their jobs, and evict old
    /// terminal jobs from memory.
    pub async fn sweep_liveness(self: &Arc<Self>) -> SweepReport {
        let stale = self.agents().stale_agents(self.config().heartbeat_timeout);
        for agent_id in &stale {
            tracing::warn!(agent_id = %agent_id, "agent heartbeat timed out");
            self.agents().disconnect(agent_id, None);
            self.agent_lost(agent_id).await;
        }
        let evicted = self.jobs().evict_terminal(self.now_ms(), self.config().job_retention);
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted finished jobs");
        }
        SweepReport { stale_agents: stale, evicted_jobs: evicted.len() }
    }
}

/// Run [`Runtime::sweep_liveness`] every `interval` until `shutdown` fires.
pub async fn run_liveness_monitor<C: Clock>(
    runtime: Arc<Runtime<C>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("liveness monitor stopped");
                return;
            }
            _ = ticker.tick() => {
                runtime.sweep_liveness().await;
            }
        }
    }
}
