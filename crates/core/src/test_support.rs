// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::graph::{
    BranchSpec, BranchesConfig, ConditionalConfig, Edge, MatrixConfig, Node, NodeKind,
    NotificationConfig, ParamKind, ParameterNode, ShellKind, ShellStep, Socket, TriggerKind,
    TriggerNode,
};
use serde_json::Value;

// ── Proptest strategies ─────────────────────────────────────────────────

pub mod strategies {
    use crate::job::JobStatus;
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Queued),
            Just(JobStatus::Dispatched),
            Just(JobStatus::Running),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
            Just(JobStatus::Cancelled),
            Just(JobStatus::Cancelling),
        ]
    }
}

// ── Node builders ───────────────────────────────────────────────────────

pub fn bash(id: &str, script: &str) -> Node {
    Node::new(
        id,
        NodeKind::Shell(ShellStep {
            shell: ShellKind::Bash,
            script: script.to_string(),
            ..Default::default()
        }),
    )
}

/// Bash node with declared input sockets `(id, label)`
pub fn bash_with_inputs(id: &str, script: &str, inputs: &[(&str, &str)]) -> Node {
    Node::new(
        id,
        NodeKind::Shell(ShellStep {
            shell: ShellKind::Bash,
            script: script.to_string(),
            inputs: sockets(inputs),
            ..Default::default()
        }),
    )
}

/// Bash node pinned to an agent
pub fn bash_on(id: &str, script: &str, agent: &str) -> Node {
    Node::new(
        id,
        NodeKind::Shell(ShellStep {
            shell: ShellKind::Bash,
            script: script.to_string(),
            agent_id: Some(agent.to_string()),
            ..Default::default()
        }),
    )
}

pub fn conditional(id: &str, expression: &str) -> Node {
    Node::new(
        id,
        NodeKind::Conditional(ConditionalConfig {
            expression: expression.to_string(),
            inputs: Vec::new(),
        }),
    )
}

pub fn notification(id: &str, message: &str) -> Node {
    Node::new(
        id,
        NodeKind::Notification(NotificationConfig {
            channel: "email".to_string(),
            recipients: vec!["ops@example.com".to_string()],
            message: message.to_string(),
            inputs: Vec::new(),
        }),
    )
}

pub fn branches(id: &str, branch_ids: &[&str], max_concurrency: Option<usize>, fail_fast: bool) -> Node {
    Node::new(
        id,
        NodeKind::ParallelBranches(BranchesConfig {
            branches: branch_ids
                .iter()
                .map(|b| BranchSpec { id: b.to_string(), name: b.to_string() })
                .collect(),
            max_concurrency,
            fail_fast,
            agent_id: None,
        }),
    )
}

pub fn matrix(id: &str, items: Vec<Value>, max_concurrency: Option<usize>) -> Node {
    Node::new(
        id,
        NodeKind::ParallelMatrix(MatrixConfig { items, max_concurrency, ..Default::default() }),
    )
}

pub fn param(label: &str, kind: ParamKind, value: Value) -> Node {
    Node::new(
        format!("param-{label}"),
        NodeKind::Parameter(ParameterNode { kind, value: Some(value), ..Default::default() }),
    )
    .with_label(label)
}

pub fn webhook_trigger(id: &str) -> Node {
    Node::new(id, NodeKind::Trigger(TriggerNode { kind: TriggerKind::Webhook, ..Default::default() }))
}

fn sockets(inputs: &[(&str, &str)]) -> Vec<Socket> {
    inputs.iter().map(|(id, label)| Socket::new(*id, *label)).collect()
}

// ── Edge builders ───────────────────────────────────────────────────────

pub fn edge(source: &str, target: &str) -> Edge {
    Edge::new(source, target)
}

pub fn edge_via(source: &str, handle: &str, target: &str) -> Edge {
    Edge::new(source, target).from_handle(handle)
}

/// Data edge from `source`'s output handle into `target`'s socket
pub fn data_edge(source: &str, source_handle: &str, target: &str, socket: &str) -> Edge {
    Edge::new(source, target).from_handle(source_handle).to_handle(socket)
}
