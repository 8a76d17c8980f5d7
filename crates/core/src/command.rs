// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled commands: the executable units a job carries.

use crate::graph::{RetryPolicy, ShellKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One branch of a parallel-branches orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTarget {
    pub branch_id: String,
    pub name: String,
    /// Node the branch sub-graph starts at
    pub target_node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BranchesPlan {
    pub branches: Vec<BranchTarget>,
    /// 0 means unbounded
    pub max_concurrency: usize,
    pub fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixPlan {
    pub items: Vec<Value>,
    pub item_variable: String,
    /// Node each iteration starts at; `None` when the matrix has no body
    pub target_node_id: Option<String>,
    pub max_concurrency: usize,
    pub fail_fast: bool,
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPlan {
    pub channel: String,
    pub recipients: Vec<String>,
    pub message: String,
}

/// What a command does when it reaches the front of its job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Placeholder-substituted script for one agent
    Script { shell: ShellKind, script: String },
    /// Several scripts sent to one agent together
    ParallelExecution { shell: ShellKind, scripts: Vec<String> },
    /// Server-side fan-out over branch sub-graphs
    #[serde(rename = "parallel_branches_orchestrator")]
    BranchesOrchestrator(BranchesPlan),
    /// Server-side fan-out over matrix items
    #[serde(rename = "parallel_matrix_orchestrator")]
    MatrixOrchestrator(MatrixPlan),
    Notification(NotificationPlan),
}

/// A compiled, executable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub node_id: String,
    pub label: String,
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Agent this command must run on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl Command {
    pub fn new(node_id: impl Into<String>, label: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            node_id: node_id.into(),
            label: label.into(),
            kind,
            working_directory: None,
            timeout_secs: None,
            agent_id: None,
            retry: None,
        }
    }

    pub fn script(node_id: impl Into<String>, shell: ShellKind, script: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self::new(node_id.clone(), node_id, CommandKind::Script { shell, script: script.into() })
    }

    crate::setters! {
        option {
            working_directory: String,
            timeout_secs: u64,
            agent_id: String,
            retry: RetryPolicy,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Runs on the server rather than on an agent
    pub fn is_orchestrator(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::BranchesOrchestrator(_) | CommandKind::MatrixOrchestrator(_)
        )
    }

    /// Job type tag sent to agents in `execute_job`
    pub fn job_type(&self) -> &'static str {
        match self.kind {
            CommandKind::Script { .. } => "script",
            CommandKind::ParallelExecution { .. } => "parallel_execution",
            CommandKind::BranchesOrchestrator(_) => "parallel_branches_orchestrator",
            CommandKind::MatrixOrchestrator(_) => "parallel_matrix_orchestrator",
            CommandKind::Notification(_) => "notification",
        }
    }

    /// Scripts as sent over the agent protocol
    pub fn agent_scripts(&self) -> Vec<AgentScript> {
        let scripts: Vec<(ShellKind, &str)> = match &self.kind {
            CommandKind::Script { shell, script } => vec![(*shell, script.as_str())],
            CommandKind::ParallelExecution { shell, scripts } => {
                scripts.iter().map(|s| (*shell, s.as_str())).collect()
            }
            _ => Vec::new(),
        };
        scripts
            .into_iter()
            .map(|(shell, script)| AgentScript {
                shell,
                script: script.to_string(),
                label: self.label.clone(),
                node_id: self.node_id.clone(),
            })
            .collect()
    }
}

/// Script entry inside an `execute_job` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentScript {
    #[serde(rename = "type")]
    pub shell: ShellKind,
    pub script: String,
    pub label: String,
    pub node_id: String,
}
