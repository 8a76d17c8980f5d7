// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use weft_core::{Edge, JobId, Node, TriggerContext};

/// Request from a local client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Compile and run a graph as a new build
    ExecuteGraph {
        project_id: String,
        nodes: Vec<Node>,
        #[serde(default)]
        edges: Vec<Edge>,
        #[serde(default)]
        start_node_id: Option<String>,
    },

    /// Run a graph starting from one of its trigger nodes
    ExecuteFromTrigger {
        project_id: String,
        nodes: Vec<Node>,
        #[serde(default)]
        edges: Vec<Edge>,
        trigger_node_id: String,
        #[serde(default)]
        trigger_context: Option<TriggerContext>,
    },

    CancelJob { job_id: JobId },

    JobStatus { job_id: JobId },

    ListAgents,

    /// Request daemon shutdown
    Shutdown,
}
