// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the daemon crate.

use std::sync::Arc;

use weft_core::{AgentId, SystemClock};
use weft_engine::{Hooks, KnownAgent, Runtime, RuntimeConfig, RuntimeDeps};
use weft_storage::{MemoryStore, Store};

use crate::lifecycle::DaemonRuntime;

/// Runtime over a memory store; agent `<id>` authenticates with `tok-<id>`.
pub(crate) fn test_runtime(agent_ids: &[&str]) -> Arc<DaemonRuntime> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let agents = agent_ids
        .iter()
        .map(|id| KnownAgent {
            id: AgentId::new(*id),
            name: id.to_string(),
            token: format!("tok-{id}"),
            capabilities: vec![],
            max_concurrent_jobs: 1,
        })
        .collect();
    Runtime::new(
        RuntimeDeps { hooks: Hooks::with_store(Arc::clone(&store)), store, agents },
        RuntimeConfig::default(),
        SystemClock,
    )
}
