// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline graph model: typed nodes connected by handle-tagged edges.
//!
//! Nodes arrive from the editor as `{id, type, data}` objects. The `type`
//! string is resolved once, at deserialization, into a closed [`NodeKind`]
//! so the compiler can match exhaustively instead of comparing strings.
//! Unrecognized types become [`NodeKind::Unknown`] and are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Well-known edge handle tags.
pub mod handle {
    pub const EXECUTION: &str = "execution";
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const TRUE: &str = "true";
    pub const FALSE: &str = "false";
    pub const ITERATION: &str = "iteration";
}

/// Interpreter a shell-step node runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellKind {
    #[default]
    Bash,
    Sh,
    Powershell,
    Cmd,
    Python,
    Node,
}

impl ShellKind {
    pub fn from_node_type(node_type: &str) -> Option<Self> {
        match node_type {
            "bash" => Some(Self::Bash),
            "sh" => Some(Self::Sh),
            "powershell" => Some(Self::Powershell),
            "cmd" => Some(Self::Cmd),
            "python" => Some(Self::Python),
            "node" | "node_script" => Some(Self::Node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::Powershell => "powershell",
            Self::Cmd => "cmd",
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

crate::simple_display! {
    ShellKind {
        Bash => "bash",
        Sh => "sh",
        Powershell => "powershell",
        Cmd => "cmd",
        Python => "python",
        Node => "node",
    }
}

/// A declared input socket. Edges target it via `targetHandle == id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl Socket {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { id: id.into(), label: label.into() }
    }

    /// Name used for placeholder tokens; falls back to the socket id.
    pub fn name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

fn default_attempts() -> u32 {
    1
}

/// Agent-side retry policy, forwarded verbatim in `execute_job`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Payload of the bash/sh/powershell/cmd/python/node node types.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellStep {
    /// Derived from the node `type`, not from `data`.
    #[serde(skip)]
    pub shell: ShellKind,
    pub script: String,
    /// Seconds
    pub timeout: Option<u64>,
    pub working_directory: Option<String>,
    pub agent_id: Option<String>,
    pub retry: Option<RetryPolicy>,
    pub inputs: Vec<Socket>,
}

/// Several scripts handed to one agent to run side by side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParallelExecution {
    pub shell: ShellKind,
    pub scripts: Vec<String>,
    pub timeout: Option<u64>,
    pub working_directory: Option<String>,
    pub agent_id: Option<String>,
    pub inputs: Vec<Socket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchesConfig {
    /// Declared branches; each is wired to its target by an edge whose
    /// source handle is the branch id. Empty means "every non-flow handle".
    pub branches: Vec<BranchSpec>,
    /// 0 or absent means unbounded
    pub max_concurrency: Option<usize>,
    pub fail_fast: bool,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatrixConfig {
    /// Pre-materialized items, one iteration each
    pub items: Vec<Value>,
    pub item_variable: String,
    pub max_concurrency: Option<usize>,
    pub fail_fast: bool,
    pub continue_on_error: bool,
    pub agent_id: Option<String>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            item_variable: "item".to_string(),
            max_concurrency: None,
            fail_fast: false,
            continue_on_error: false,
            agent_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionalConfig {
    #[serde(alias = "condition")]
    pub expression: String,
    pub inputs: Vec<Socket>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationConfig {
    pub channel: String,
    pub recipients: Vec<String>,
    pub message: String,
    pub inputs: Vec<Socket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Cron,
    Webhook,
    Job,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerNode {
    #[serde(skip)]
    pub kind: TriggerKind,
    pub schedule: Option<String>,
    pub path: Option<String>,
    /// Upstream project for job triggers
    pub job: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    String,
    Text,
    Choice,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterNode {
    #[serde(skip)]
    pub kind: ParamKind,
    pub value: Option<Value>,
    pub default_value: Option<Value>,
    pub options: Vec<String>,
}

impl ParameterNode {
    /// Explicit value, then default, then the kind's zero value.
    pub fn resolved_value(&self) -> Value {
        if let Some(v) = self.value.as_ref().filter(|v| !v.is_null()) {
            return v.clone();
        }
        if let Some(v) = self.default_value.as_ref().filter(|v| !v.is_null()) {
            return v.clone();
        }
        match self.kind {
            ParamKind::String | ParamKind::Text => Value::String(String::new()),
            ParamKind::Choice => {
                Value::String(self.options.first().cloned().unwrap_or_default())
            }
            ParamKind::Boolean => Value::Bool(false),
        }
    }
}

/// Closed set of node categories.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Shell(ShellStep),
    ParallelExecution(ParallelExecution),
    ParallelBranches(BranchesConfig),
    ParallelMatrix(MatrixConfig),
    Conditional(ConditionalConfig),
    Notification(NotificationConfig),
    Trigger(TriggerNode),
    Parameter(ParameterNode),
    /// Unrecognized `type` string, kept for diagnostics
    Unknown(String),
}

impl NodeKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Shell(s) => s.shell.as_str(),
            Self::ParallelExecution(_) => "parallel_execution",
            Self::ParallelBranches(_) => "parallel_branches",
            Self::ParallelMatrix(_) => "parallel_matrix",
            Self::Conditional(_) => "conditional",
            Self::Notification(_) => "notification",
            Self::Trigger(t) => match t.kind {
                TriggerKind::Cron => "cron_trigger",
                TriggerKind::Webhook => "webhook_trigger",
                TriggerKind::Job => "job_trigger",
            },
            Self::Parameter(p) => match p.kind {
                ParamKind::String => "string_param",
                ParamKind::Text => "text_param",
                ParamKind::Choice => "choice_param",
                ParamKind::Boolean => "boolean_param",
            },
            Self::Unknown(t) => t,
        }
    }

    /// Input sockets that take data edges
    pub fn inputs(&self) -> &[Socket] {
        match self {
            Self::Shell(s) => &s.inputs,
            Self::ParallelExecution(p) => &p.inputs,
            Self::Conditional(c) => &c.inputs,
            Self::Notification(n) => &n.inputs,
            _ => &[],
        }
    }

    pub fn required_agent(&self) -> Option<&str> {
        let agent = match self {
            Self::Shell(s) => s.agent_id.as_deref(),
            Self::ParallelExecution(p) => p.agent_id.as_deref(),
            Self::ParallelBranches(b) => b.agent_id.as_deref(),
            Self::ParallelMatrix(m) => m.agent_id.as_deref(),
            _ => None,
        };
        agent.filter(|a| !a.is_empty())
    }
}

/// A graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        let id = id.into();
        Self { label: id.clone(), id, kind }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// May originate a run when nothing flows into it
    pub fn can_start(&self) -> bool {
        !matches!(
            self.kind,
            NodeKind::Parameter(_) | NodeKind::Conditional(_) | NodeKind::Notification(_)
        )
    }
}

/// Editor wire shape of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    data: Value,
}

impl TryFrom<RawNode> for Node {
    type Error = serde_json::Error;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let data = match raw.data {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        let label = data
            .get("label")
            .and_then(Value::as_str)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| raw.id.clone());

        let kind = if let Some(shell) = ShellKind::from_node_type(&raw.node_type) {
            let mut step: ShellStep = serde_json::from_value(data)?;
            step.shell = shell;
            NodeKind::Shell(step)
        } else {
            match raw.node_type.as_str() {
                "parallel_execution" => NodeKind::ParallelExecution(serde_json::from_value(data)?),
                "parallel_branches" => NodeKind::ParallelBranches(serde_json::from_value(data)?),
                "parallel_matrix" => NodeKind::ParallelMatrix(serde_json::from_value(data)?),
                "conditional" => NodeKind::Conditional(serde_json::from_value(data)?),
                "notification" => NodeKind::Notification(serde_json::from_value(data)?),
                "cron_trigger" | "cron" => trigger(data, TriggerKind::Cron)?,
                "webhook_trigger" | "webhook" => trigger(data, TriggerKind::Webhook)?,
                "job_trigger" => trigger(data, TriggerKind::Job)?,
                "string_param" => parameter(data, ParamKind::String)?,
                "text_param" => parameter(data, ParamKind::Text)?,
                "choice_param" => parameter(data, ParamKind::Choice)?,
                "boolean_param" => parameter(data, ParamKind::Boolean)?,
                other => NodeKind::Unknown(other.to_string()),
            }
        };

        Ok(Node { id: raw.id, label, kind })
    }
}

fn trigger(data: Value, kind: TriggerKind) -> Result<NodeKind, serde_json::Error> {
    let mut node: TriggerNode = serde_json::from_value(data)?;
    node.kind = kind;
    Ok(NodeKind::Trigger(node))
}

fn parameter(data: Value, kind: ParamKind) -> Result<NodeKind, serde_json::Error> {
    let mut node: ParameterNode = serde_json::from_value(data)?;
    node.kind = kind;
    Ok(NodeKind::Parameter(node))
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.kind.type_name().to_string();
        let data = match &node.kind {
            NodeKind::Shell(s) => serde_json::to_value(s),
            NodeKind::ParallelExecution(p) => serde_json::to_value(p),
            NodeKind::ParallelBranches(b) => serde_json::to_value(b),
            NodeKind::ParallelMatrix(m) => serde_json::to_value(m),
            NodeKind::Conditional(c) => serde_json::to_value(c),
            NodeKind::Notification(n) => serde_json::to_value(n),
            NodeKind::Trigger(t) => serde_json::to_value(t),
            NodeKind::Parameter(p) => serde_json::to_value(p),
            NodeKind::Unknown(_) => Ok(Value::Object(serde_json::Map::new())),
        };
        let mut data = data.unwrap_or(Value::Null);
        if let Value::Object(map) = &mut data {
            map.insert("label".to_string(), Value::String(node.label));
        }
        RawNode { id: node.id, node_type, data }
    }
}

/// Payload of the trigger that started a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerContext {
    /// Request body for webhook triggers
    pub body: Value,
    pub headers: serde_json::Map<String, Value>,
    pub query: serde_json::Map<String, Value>,
}

impl TriggerContext {
    /// Value a webhook exposes on `socket`: a named section, or a body field.
    pub fn socket_value(&self, socket: &str) -> Option<Value> {
        match socket {
            "body" => Some(self.body.clone()),
            "headers" => Some(Value::Object(self.headers.clone())),
            "query" => Some(Value::Object(self.query.clone())),
            other => self.body.get(other).cloned(),
        }
    }
}

/// Directed, handle-tagged connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }

    /// Source handle, with empty strings treated as absent
    pub fn source_tag(&self) -> Option<&str> {
        self.source_handle.as_deref().filter(|h| !h.is_empty())
    }

    fn target_tag(&self) -> Option<&str> {
        self.target_handle.as_deref().filter(|h| !h.is_empty())
    }

    /// Carries execution order rather than data: the target side is the
    /// node itself (no handle) or its `execution` input.
    pub fn is_control_flow(&self) -> bool {
        matches!(self.target_tag(), None | Some(handle::EXECUTION))
    }

    /// Handle-less or `execution`-tagged control-flow edge
    pub fn is_execution(&self) -> bool {
        self.is_control_flow() && matches!(self.source_tag(), None | Some(handle::EXECUTION))
    }
}

/// A node/edge graph as submitted by the application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn outgoing<'a, 'b>(&'a self, id: &'b str) -> impl Iterator<Item = &'a Edge> + use<'a, 'b> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn incoming<'a, 'b>(&'a self, id: &'b str) -> impl Iterator<Item = &'a Edge> + use<'a, 'b> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Whether anything flows into `id` (as opposed to data only)
    pub fn has_incoming_control(&self, id: &str) -> bool {
        self.incoming(id).any(Edge::is_control_flow)
    }

    /// Whether `id` declares `success`/`failure` output edges
    pub fn has_outcome_edges(&self, id: &str) -> bool {
        self.outgoing(id)
            .any(|e| matches!(e.source_tag(), Some(handle::SUCCESS) | Some(handle::FAILURE)))
    }

    /// Target of the `success` or `failure` edge leaving `id`
    pub fn outcome_target(&self, id: &str, succeeded: bool) -> Option<&str> {
        let tag = if succeeded { handle::SUCCESS } else { handle::FAILURE };
        self.targets_via(id, tag).into_iter().next()
    }

    /// Targets of edges leaving `id` through the given source handle
    pub fn targets_via(&self, id: &str, tag: &str) -> Vec<&str> {
        self.outgoing(id)
            .filter(|e| e.source_tag() == Some(tag))
            .map(|e| e.target.as_str())
            .collect()
    }

    /// Targets reached through handle-less or `execution` edges
    pub fn execution_successors(&self, id: &str) -> Vec<&str> {
        self.outgoing(id).filter(|e| e.is_execution()).map(|e| e.target.as_str()).collect()
    }

    /// Edges feeding the given input socket of a node
    pub fn data_sources<'a>(
        &'a self,
        node_id: &'a str,
        socket_id: &'a str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.incoming(node_id).filter(move |e| e.target_tag() == Some(socket_id))
    }

    /// Label → resolved value for every parameter node
    pub fn parameter_values(&self) -> HashMap<String, Value> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Parameter(p) => Some((n.label.clone(), p.resolved_value())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
