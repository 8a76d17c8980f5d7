// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-build execution state held while the build runs.
//!
//! Each build keeps the graph it was started from (runtime routing
//! recompiles against it), the trigger payload, the outputs recorded so far
//! and the node status map. The whole context is dropped when the build
//! finishes; the final [`BuildExecutionState`] is handed back to be flushed.

use crate::compiler::Outputs;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{BuildExecutionState, BuildKey, BuildStatus, Graph, NodeStatus, TriggerContext};

struct BuildContext {
    state: BuildExecutionState,
    graph: Arc<Graph>,
    trigger: Option<TriggerContext>,
    outputs: Outputs,
}

#[derive(Default)]
pub struct ExecutionTracker {
    builds: RwLock<HashMap<BuildKey, Arc<Mutex<BuildContext>>>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self, key: &BuildKey) -> Option<Arc<Mutex<BuildContext>>> {
        self.builds.read().get(key).cloned()
    }

    pub fn start(&self, key: &BuildKey, graph: Arc<Graph>, trigger: Option<TriggerContext>, now_ms: u64) {
        let ctx = BuildContext {
            state: BuildExecutionState::new(key, now_ms),
            graph,
            trigger,
            outputs: Outputs::new(),
        };
        self.builds.write().insert(key.clone(), Arc::new(Mutex::new(ctx)));
    }

    pub fn graph(&self, key: &BuildKey) -> Option<Arc<Graph>> {
        self.context(key).map(|c| Arc::clone(&c.lock().graph))
    }

    pub fn trigger(&self, key: &BuildKey) -> Option<TriggerContext> {
        self.context(key).and_then(|c| c.lock().trigger.clone())
    }

    /// Record a node status change. No-op for builds no longer tracked.
    pub fn mark_node(&self, key: &BuildKey, node_id: &str, label: &str, status: NodeStatus, now_ms: u64) {
        if let Some(ctx) = self.context(key) {
            ctx.lock().state.mark(node_id, label, status, now_ms);
        }
    }

    /// Store a node's output under `node` (and `node:socket` keys if the
    /// output is a JSON object).
    pub fn record_output(&self, key: &BuildKey, node_id: &str, output: &str) {
        let Some(ctx) = self.context(key) else { return };
        let mut ctx = ctx.lock();
        let trimmed = output.trim();
        let value = serde_json::from_str::<Value>(trimmed)
            .unwrap_or_else(|_| Value::String(trimmed.to_string()));
        if let Value::Object(fields) = &value {
            for (socket, v) in fields {
                ctx.outputs.insert(format!("{node_id}:{socket}"), v.clone());
            }
        }
        ctx.outputs.insert(node_id.to_string(), value);
    }

    pub fn outputs(&self, key: &BuildKey) -> Outputs {
        self.context(key).map(|c| c.lock().outputs.clone()).unwrap_or_default()
    }

    pub fn record_failure(&self, key: &BuildKey, message: &str) {
        if let Some(ctx) = self.context(key) {
            ctx.lock().state.record_failure(message);
        }
    }

    pub fn is_failed(&self, key: &BuildKey) -> bool {
        self.context(key).is_some_and(|c| c.lock().state.is_failed())
    }

    pub fn nodes_executed(&self, key: &BuildKey) -> usize {
        self.context(key).map(|c| c.lock().state.nodes_executed()).unwrap_or(0)
    }

    /// Settle and remove the build. `None` if it already finished.
    pub fn finish(
        &self,
        key: &BuildKey,
        status: BuildStatus,
        message: Option<String>,
        now_ms: u64,
    ) -> Option<BuildExecutionState> {
        let ctx = self.builds.write().remove(key)?;
        let mut ctx = ctx.lock();
        ctx.state.finish(status, message, now_ms);
        Some(ctx.state.clone())
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
