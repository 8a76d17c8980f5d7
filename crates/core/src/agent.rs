// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

crate::string_id! {
    /// Identifier of a worker agent, assigned in the agents file.
    pub struct AgentId;
}

/// Requirement alias resolved to the agent named [`LOCAL_AGENT_NAME`].
pub const LOCAL_AGENT_ALIAS: &str = "local";
pub const LOCAL_AGENT_NAME: &str = "Local Agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    #[default]
    Offline,
    Busy,
    Idle,
    Ready,
}

crate::simple_display! {
    AgentStatus {
        Online => "online",
        Offline => "offline",
        Busy => "busy",
        Idle => "idle",
        Ready => "ready",
    }
}

impl AgentStatus {
    /// Parse a status reported by an agent heartbeat.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "busy" => Some(Self::Busy),
            "idle" => Some(Self::Idle),
            "ready" => Some(Self::Ready),
            _ => None,
        }
    }

    /// Any status other than offline counts as online for selection.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// Host details sent with `register`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub architecture: String,
    pub capabilities: Vec<String>,
    pub version: String,
    /// Free-form `systemInfo` blob
    pub extra: Value,
}

/// Metadata about an agent; survives disconnects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub capabilities: Vec<String>,
    pub max_concurrent_jobs: u32,
    pub status: AgentStatus,
    pub current_jobs: u32,
    pub last_heartbeat_ms: u64,
    pub connected_at_ms: Option<u64>,
    pub system: Option<SystemInfo>,
}

impl AgentRecord {
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            capabilities: Vec::new(),
            max_concurrent_jobs: 1,
            status: AgentStatus::Offline,
            current_jobs: 0,
            last_heartbeat_ms: 0,
            connected_at_ms: None,
            system: None,
        }
    }

    pub fn record_heartbeat(&mut self, status: Option<AgentStatus>, current_jobs: u32, now_ms: u64) {
        if let Some(status) = status {
            self.status = status;
        }
        self.current_jobs = current_jobs;
        self.last_heartbeat_ms = now_ms;
    }

    pub fn register(&mut self, system: SystemInfo, now_ms: u64) {
        if !system.capabilities.is_empty() {
            self.capabilities = system.capabilities.clone();
        }
        self.system = Some(system);
        self.status = AgentStatus::Online;
        self.last_heartbeat_ms = now_ms;
    }

    /// Live agent whose last heartbeat is older than `timeout`
    pub fn is_stale(&self, now_ms: u64, timeout: Duration) -> bool {
        self.status.is_live()
            && now_ms.saturating_sub(self.last_heartbeat_ms) > timeout.as_millis() as u64
    }

    pub fn mark_offline(&mut self) {
        self.status = AgentStatus::Offline;
        self.current_jobs = 0;
        self.connected_at_ms = None;
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
