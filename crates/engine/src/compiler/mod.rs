// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph compiler: nodes and edges in, ordered commands out.
//!
//! Compilation is pure. Runtime routing (success/failure edges, branch and
//! matrix sub-graphs) re-enters the compiler with a start node and the
//! outputs recorded so far.

pub mod condition;
pub mod params;
pub mod placeholder;

pub use condition::ConditionError;
pub use params::{Outputs, ParamMap};

use std::collections::HashSet;
use thiserror::Error;
use weft_core::{
    handle, BranchTarget, BranchesConfig, BranchesPlan, Command, CommandKind, Graph, MatrixConfig,
    MatrixPlan, Node, NodeKind, NotificationPlan, TriggerContext,
};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("start node not found: {0}")]
    UnknownStartNode(String),
    #[error("graph has no executable nodes")]
    NoExecutableNodes,
    #[error("conditional node {node}: {source}")]
    Condition {
        node: String,
        #[source]
        source: ConditionError,
    },
}

/// Inputs besides the graph itself
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub trigger: Option<TriggerContext>,
    pub outputs: Outputs,
    pub start_node: Option<String>,
}

impl CompileOptions {
    weft_core::setters! {
        set {
            outputs: Outputs,
        }
        option {
            trigger: TriggerContext,
            start_node: String,
        }
    }
}

/// Compile `graph` into the commands of one job.
pub fn compile(graph: &Graph, opts: &CompileOptions) -> Result<Vec<Command>, CompileError> {
    let params = ParamMap::build(graph, opts.trigger.as_ref(), Some(&opts.outputs));
    let starts = start_nodes(graph, opts.start_node.as_deref())?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut commands = Vec::new();
    for start in starts {
        let mut stack = vec![start.to_string()];
        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = graph.node(&id) else {
                tracing::warn!(node_id = %id, "edge points at missing node");
                continue;
            };
            let next = visit(graph, node, &params, &mut commands)?;
            for target in next.into_iter().rev() {
                if !visited.contains(target) {
                    stack.push(target.to_string());
                }
            }
        }
    }
    Ok(commands)
}

/// Emit the node's command (if any) and return the successors to follow.
fn visit<'g>(
    graph: &'g Graph,
    node: &'g Node,
    params: &ParamMap<'_>,
    commands: &mut Vec<Command>,
) -> Result<Vec<&'g str>, CompileError> {
    let id = node.id.as_str();
    let next = match &node.kind {
        NodeKind::Shell(step) => {
            let script = placeholder::render(&step.script, &params.bindings(graph, node));
            let mut cmd = Command::new(id, &node.label, CommandKind::Script { shell: step.shell, script });
            cmd.working_directory = step.working_directory.clone();
            cmd.timeout_secs = step.timeout;
            cmd.agent_id = node.kind.required_agent().map(str::to_string);
            cmd.retry = step.retry.clone();
            commands.push(cmd);
            flow_unless_routed(graph, id)
        }
        NodeKind::ParallelExecution(p) => {
            let bindings = params.bindings(graph, node);
            let scripts = p.scripts.iter().map(|s| placeholder::render(s, &bindings)).collect();
            let mut cmd = Command::new(
                id,
                &node.label,
                CommandKind::ParallelExecution { shell: p.shell, scripts },
            );
            cmd.working_directory = p.working_directory.clone();
            cmd.timeout_secs = p.timeout;
            cmd.agent_id = node.kind.required_agent().map(str::to_string);
            commands.push(cmd);
            graph.execution_successors(id)
        }
        NodeKind::ParallelBranches(cfg) => {
            let mut cmd = Command::new(
                id,
                &node.label,
                CommandKind::BranchesOrchestrator(branches_plan(graph, node, cfg)),
            );
            cmd.agent_id = node.kind.required_agent().map(str::to_string);
            commands.push(cmd);
            flow_unless_routed(graph, id)
        }
        NodeKind::ParallelMatrix(cfg) => {
            let mut cmd = Command::new(
                id,
                &node.label,
                CommandKind::MatrixOrchestrator(matrix_plan(graph, id, cfg)),
            );
            cmd.agent_id = node.kind.required_agent().map(str::to_string);
            commands.push(cmd);
            graph.execution_successors(id)
        }
        NodeKind::Conditional(cfg) => {
            let expr = placeholder::render_condition(&cfg.expression, &params.bindings(graph, node));
            let taken = condition::evaluate_bool(&expr)
                .map_err(|source| CompileError::Condition { node: id.to_string(), source })?;
            tracing::debug!(node_id = id, expression = %expr, taken, "evaluated condition");
            graph.targets_via(id, if taken { handle::TRUE } else { handle::FALSE })
        }
        NodeKind::Notification(cfg) => {
            let message = placeholder::render(&cfg.message, &params.bindings(graph, node));
            commands.push(Command::new(
                id,
                &node.label,
                CommandKind::Notification(NotificationPlan {
                    channel: cfg.channel.clone(),
                    recipients: cfg.recipients.clone(),
                    message,
                }),
            ));
            graph.execution_successors(id)
        }
        NodeKind::Trigger(_) | NodeKind::Parameter(_) => graph.execution_successors(id),
        NodeKind::Unknown(node_type) => {
            tracing::warn!(node_id = id, node_type = %node_type, "skipping unknown node type");
            graph.execution_successors(id)
        }
    };
    Ok(next)
}

/// Nodes with success/failure edges end the static compile; the runtime
/// picks the edge once the result is known.
fn flow_unless_routed<'g>(graph: &'g Graph, id: &str) -> Vec<&'g str> {
    if graph.has_outcome_edges(id) {
        Vec::new()
    } else {
        graph.execution_successors(id)
    }
}

fn branches_plan(graph: &Graph, node: &Node, cfg: &BranchesConfig) -> BranchesPlan {
    let declared: Vec<(String, String)> = if cfg.branches.is_empty() {
        graph
            .outgoing(&node.id)
            .filter_map(|e| e.source_tag())
            .filter(|tag| {
                !matches!(*tag, handle::EXECUTION | handle::SUCCESS | handle::FAILURE)
            })
            .map(|tag| (tag.to_string(), tag.to_string()))
            .collect()
    } else {
        cfg.branches
            .iter()
            .map(|b| {
                let name = if b.name.is_empty() { b.id.clone() } else { b.name.clone() };
                (b.id.clone(), name)
            })
            .collect()
    };

    let mut branches = Vec::new();
    for (branch_id, name) in declared {
        match graph.targets_via(&node.id, &branch_id).first() {
            Some(target) => branches.push(BranchTarget {
                branch_id,
                name,
                target_node_id: target.to_string(),
            }),
            None => {
                tracing::warn!(node_id = %node.id, branch = %branch_id, "branch has no target");
            }
        }
    }
    BranchesPlan { branches, max_concurrency: cfg.max_concurrency.unwrap_or(0), fail_fast: cfg.fail_fast }
}

fn matrix_plan(graph: &Graph, id: &str, cfg: &MatrixConfig) -> MatrixPlan {
    MatrixPlan {
        items: cfg.items.clone(),
        item_variable: cfg.item_variable.clone(),
        target_node_id: graph.targets_via(id, handle::ITERATION).first().map(|t| t.to_string()),
        max_concurrency: cfg.max_concurrency.unwrap_or(0),
        fail_fast: cfg.fail_fast,
        continue_on_error: cfg.continue_on_error,
    }
}

/// Where compilation begins.
///
/// An explicit start node wins. Otherwise every node without incoming
/// control flow that can originate a run; failing that, a lone node, the
/// first fan-out node, or the first step-like node.
pub fn start_nodes<'g>(graph: &'g Graph, start: Option<&str>) -> Result<Vec<&'g str>, CompileError> {
    if let Some(start) = start {
        return graph
            .node(start)
            .map(|n| vec![n.id.as_str()])
            .ok_or_else(|| CompileError::UnknownStartNode(start.to_string()));
    }

    let roots: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|n| n.can_start() && !graph.has_incoming_control(&n.id))
        .map(|n| n.id.as_str())
        .collect();
    if !roots.is_empty() {
        return Ok(roots);
    }
    if let [only] = graph.nodes.as_slice() {
        return Ok(vec![only.id.as_str()]);
    }

    let fan_out = graph
        .nodes
        .iter()
        .find(|n| matches!(n.kind, NodeKind::ParallelBranches(_) | NodeKind::ParallelMatrix(_)));
    let step_like = || {
        graph.nodes.iter().find(|n| {
            matches!(
                n.kind,
                NodeKind::Shell(_) | NodeKind::ParallelExecution(_) | NodeKind::Notification(_)
            )
        })
    };
    fan_out
        .or_else(step_like)
        .map(|n| vec![n.id.as_str()])
        .ok_or(CompileError::NoExecutableNodes)
}

/// Commands that run on agents
pub fn scripts(commands: &[Command]) -> impl Iterator<Item = &Command> {
    commands
        .iter()
        .filter(|c| matches!(c.kind, CommandKind::Script { .. } | CommandKind::ParallelExecution { .. }))
}

/// Commands that run on the server as fan-out orchestrators
pub fn orchestrators(commands: &[Command]) -> impl Iterator<Item = &Command> {
    commands.iter().filter(|c| c.is_orchestrator())
}

pub fn notifications(commands: &[Command]) -> impl Iterator<Item = &Command> {
    commands.iter().filter(|c| matches!(c.kind, CommandKind::Notification(_)))
}

#[cfg(test)]
#[path = "../compiler_tests.rs"]
mod tests;
