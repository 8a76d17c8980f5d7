// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use weft_core::{AgentId, AgentRecord, Job, JobId};

/// Response from daemon to a local client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// A build was started
    Executed {
        job_id: JobId,
        build_number: u64,
        agent_id: Option<AgentId>,
        message: String,
    },

    /// Single job snapshot
    Job { job: Option<Box<Job>> },

    Agents { agents: Vec<AgentRecord> },

    /// Error response
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}
