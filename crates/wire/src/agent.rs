// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent protocol messages.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use weft_core::{AgentId, AgentScript, JobId, RetryPolicy, SystemInfo};

/// Host details an agent sends after authenticating
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub hostname: String,
    pub platform: String,
    pub architecture: String,
    pub capabilities: Vec<String>,
    pub version: String,
    pub system_info: Value,
}

impl From<Registration> for SystemInfo {
    fn from(r: Registration) -> Self {
        SystemInfo {
            hostname: r.hostname,
            platform: r.platform,
            architecture: r.architecture,
            capabilities: r.capabilities,
            version: r.version,
            extra: r.system_info,
        }
    }
}

/// Status values carried by `job_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Started,
    Failed,
    Cancelled,
    Cancelling,
    CancelFailed,
}

/// Agent → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentMessage {
    Authenticate {
        token: String,
    },
    Register(Registration),
    Heartbeat {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        current_jobs: u32,
    },
    JobOutput {
        job_id: JobId,
        output: String,
    },
    JobComplete {
        job_id: JobId,
        #[serde(default)]
        exit_code: i32,
        #[serde(default)]
        output: Option<String>,
    },
    JobError {
        job_id: JobId,
        error: String,
        #[serde(default)]
        exit_code: Option<i32>,
    },
    JobStatus {
        job_id: JobId,
        status: ReportedStatus,
        #[serde(default)]
        message: Option<String>,
    },
}

impl AgentMessage {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::JobOutput { job_id, .. }
            | Self::JobComplete { job_id, .. }
            | Self::JobError { job_id, .. }
            | Self::JobStatus { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Register(_) => "register",
            Self::Heartbeat { .. } => "heartbeat",
            Self::JobOutput { .. } => "job_output",
            Self::JobComplete { .. } => "job_complete",
            Self::JobError { .. } => "job_error",
            Self::JobStatus { .. } => "job_status",
        }
    }
}

/// Position of a command within its job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub index: usize,
    pub total: usize,
    pub node_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJob {
    pub job_id: JobId,
    pub project_id: String,
    pub commands: Vec<AgentScript>,
    pub environment: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    pub sequence: Sequence,
}

/// Server → agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Authenticated { agent_id: AgentId },
    AuthError { message: String },
    Registered { agent_id: AgentId },
    ExecuteJob(ExecuteJob),
    CancelJob { job_id: JobId },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "authenticated",
            Self::AuthError { .. } => "auth_error",
            Self::Registered { .. } => "registered",
            Self::ExecuteJob(_) => "execute_job",
            Self::CancelJob { .. } => "cancel_job",
        }
    }
}

/// Parse one text frame from an agent
pub fn parse_agent_message(text: &str) -> Result<AgentMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Render a server message as a text frame
pub fn to_text(msg: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
