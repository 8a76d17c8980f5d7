// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-build node execution state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

crate::simple_display! {
    NodeStatus {
        Pending => "pending",
        Executing => "executing",
        Completed => "completed",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub status: NodeStatus,
    pub label: String,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Running,
    Success,
    Failure,
    Cancelled,
}

crate::simple_display! {
    BuildStatus {
        Running => "running",
        Success => "success",
        Failure => "failure",
        Cancelled => "cancelled",
    }
}

/// (project, build number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildKey {
    pub project_id: String,
    pub build_number: u64,
}

impl BuildKey {
    pub fn new(project_id: impl Into<String>, build_number: u64) -> Self {
        Self { project_id: project_id.into(), build_number }
    }
}

impl std::fmt::Display for BuildKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.project_id, self.build_number)
    }
}

/// Node statuses for one build, flushed to storage when it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildExecutionState {
    pub project_id: String,
    pub build_number: u64,
    pub status: BuildStatus,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub message: Option<String>,
    pub nodes: BTreeMap<String, NodeExecution>,
}

impl BuildExecutionState {
    pub fn new(key: &BuildKey, now_ms: u64) -> Self {
        Self {
            project_id: key.project_id.clone(),
            build_number: key.build_number,
            status: BuildStatus::Running,
            started_at_ms: now_ms,
            finished_at_ms: None,
            message: None,
            nodes: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> BuildKey {
        BuildKey::new(self.project_id.clone(), self.build_number)
    }

    pub fn mark(&mut self, node_id: &str, label: &str, status: NodeStatus, now_ms: u64) {
        let entry = self.nodes.entry(node_id.to_string()).or_insert_with(|| NodeExecution {
            status: NodeStatus::Pending,
            label: label.to_string(),
            started_at_ms: None,
            finished_at_ms: None,
        });
        entry.status = status;
        match status {
            NodeStatus::Pending => {}
            NodeStatus::Executing => {
                entry.started_at_ms = Some(now_ms);
                entry.finished_at_ms = None;
            }
            NodeStatus::Completed | NodeStatus::Failed => {
                entry.started_at_ms.get_or_insert(now_ms);
                entry.finished_at_ms = Some(now_ms);
            }
        }
    }

    /// Nodes that started, whether or not they finished
    pub fn nodes_executed(&self) -> usize {
        self.nodes.values().filter(|n| n.status != NodeStatus::Pending).count()
    }

    /// Latch failure; later success reports cannot undo it.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        if self.status != BuildStatus::Failure {
            self.status = BuildStatus::Failure;
            self.message = Some(message.into());
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == BuildStatus::Failure
    }

    /// Settle the final status, returning what was recorded.
    pub fn finish(&mut self, status: BuildStatus, message: Option<String>, now_ms: u64) -> BuildStatus {
        if self.status != BuildStatus::Failure {
            self.status = status;
            if message.is_some() {
                self.message = message;
            }
        }
        self.finished_at_ms = Some(now_ms);
        self.status
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
