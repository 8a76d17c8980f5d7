// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: live connections plus metadata that outlives them.
//!
//! Two maps with separate locks. The connection table holds a sender per
//! connected agent; the metadata table holds one `Arc<Mutex<AgentRecord>>`
//! per known agent. Neither lock is held across an `.await`.

use crate::error::AuthError;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use weft_core::{
    AgentId, AgentRecord, AgentStatus, Clock, SystemInfo, LOCAL_AGENT_ALIAS, LOCAL_AGENT_NAME,
};
use weft_wire::ServerMessage;

/// Outbound half of an agent connection
pub type AgentTx = mpsc::UnboundedSender<ServerMessage>;

/// An agent allowed to connect, as listed in the agents file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownAgent {
    pub id: AgentId,
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: u32,
}

fn default_max_jobs() -> u32 {
    1
}

/// Handle for one authenticated connection.
///
/// The session number lets a stale connection's teardown leave a newer
/// reconnection of the same agent alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSession {
    pub agent_id: AgentId,
    pub session: u64,
}

struct Connection {
    tx: AgentTx,
    session: u64,
}

pub struct AgentRegistry<C: Clock> {
    clock: C,
    tokens: HashMap<String, AgentId>,
    connections: RwLock<HashMap<AgentId, Connection>>,
    records: RwLock<HashMap<AgentId, Arc<Mutex<AgentRecord>>>>,
    next_session: AtomicU64,
}

impl<C: Clock> AgentRegistry<C> {
    pub fn new(known: Vec<KnownAgent>, clock: C) -> Self {
        let mut tokens = HashMap::new();
        let mut records = HashMap::new();
        for agent in known {
            let mut record = AgentRecord::new(agent.id.clone(), agent.name);
            record.capabilities = agent.capabilities;
            record.max_concurrent_jobs = agent.max_concurrent_jobs;
            tokens.insert(agent.token, agent.id.clone());
            records.insert(agent.id, Arc::new(Mutex::new(record)));
        }
        Self {
            clock,
            tokens,
            connections: RwLock::new(HashMap::new()),
            records: RwLock::new(records),
            next_session: AtomicU64::new(1),
        }
    }

    fn record(&self, id: &AgentId) -> Option<Arc<Mutex<AgentRecord>>> {
        self.records.read().get(id).cloned()
    }

    fn record_or_insert(&self, id: &AgentId) -> Arc<Mutex<AgentRecord>> {
        if let Some(record) = self.record(id) {
            return record;
        }
        let mut records = self.records.write();
        records
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AgentRecord::new(id.clone(), id.as_str()))))
            .clone()
    }

    /// Validate a token and install the connection, replacing any previous one.
    pub fn authenticate(&self, token: &str, tx: AgentTx) -> Result<AgentSession, AuthError> {
        let agent_id = self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)?;
        let record = self.record_or_insert(&agent_id);
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let replaced = self.connections.write().insert(agent_id.clone(), Connection { tx, session });
        if replaced.is_some() {
            tracing::info!(agent_id = %agent_id, "agent reconnected, replacing old connection");
        }
        let now = self.clock.epoch_ms();
        {
            let mut record = record.lock();
            record.connected_at_ms = Some(now);
            record.last_heartbeat_ms = now;
        }
        tracing::info!(agent_id = %agent_id, session, "agent authenticated");
        Ok(AgentSession { agent_id, session })
    }

    /// Record host details and bring the agent online.
    pub fn register(&self, agent_id: &AgentId, system: SystemInfo) -> Result<(), AuthError> {
        if !self.is_connected(agent_id) {
            return Err(AuthError::NotAuthenticated(agent_id.clone()));
        }
        let record = self.record_or_insert(agent_id);
        record.lock().register(system, self.clock.epoch_ms());
        tracing::info!(agent_id = %agent_id, "agent registered");
        Ok(())
    }

    /// Idempotent liveness ping; creates a minimal record for unseen agents.
    pub fn heartbeat(&self, agent_id: &AgentId, status: Option<&str>, current_jobs: u32) {
        let parsed = status.and_then(AgentStatus::parse);
        if status.is_some() && parsed.is_none() {
            tracing::debug!(agent_id = %agent_id, status, "ignoring unknown heartbeat status");
        }
        let record = self.record_or_insert(agent_id);
        let mut record = record.lock();
        // a heartbeat from a connected agent means it is alive
        let status = match parsed {
            Some(s) => Some(s),
            None if record.status == AgentStatus::Offline && self.is_connected(agent_id) => {
                Some(AgentStatus::Online)
            }
            None => None,
        };
        record.record_heartbeat(status, current_jobs, self.clock.epoch_ms());
    }

    pub fn is_connected(&self, agent_id: &AgentId) -> bool {
        self.connections.read().contains_key(agent_id)
    }

    fn connected_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.connections.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn is_live(&self, id: &AgentId) -> bool {
        self.record(id).is_some_and(|r| r.lock().status.is_live())
    }

    /// Pick an agent for a command.
    ///
    /// A requirement names one agent (or `"local"`) and is never
    /// substituted: `None` if that agent is not connected and online.
    /// Without one, the first connected live agent in id order.
    pub fn find_available(&self, requirement: Option<&str>) -> Option<AgentId> {
        let connected = self.connected_ids();
        match requirement {
            Some(LOCAL_AGENT_ALIAS) => connected.into_iter().find(|id| {
                self.record(id).is_some_and(|r| {
                    let r = r.lock();
                    r.name == LOCAL_AGENT_NAME && r.status.is_live()
                })
            }),
            Some(required) => connected.into_iter().find(|id| id == required && self.is_live(id)),
            None => connected.into_iter().find(|id| self.is_live(id)),
        }
    }

    /// Whether `agent_id` could take a command with this requirement
    pub fn satisfies(&self, agent_id: &AgentId, requirement: Option<&str>) -> bool {
        if !self.is_connected(agent_id) || !self.is_live(agent_id) {
            return false;
        }
        match requirement {
            None => true,
            Some(LOCAL_AGENT_ALIAS) => self.record(agent_id).is_some_and(|r| r.lock().name == LOCAL_AGENT_NAME),
            Some(required) => agent_id == required,
        }
    }

    /// Queue a message on the agent's connection. False if not connected
    /// or the connection's writer has gone away.
    pub fn send(&self, agent_id: &AgentId, msg: ServerMessage) -> bool {
        match self.connections.read().get(agent_id) {
            Some(conn) => conn.tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Drop the connection and mark the agent offline.
    ///
    /// With a session, only that session's connection is removed. Returns
    /// whether a connection was removed.
    pub fn disconnect(&self, agent_id: &AgentId, session: Option<u64>) -> bool {
        let removed = {
            let mut conns = self.connections.write();
            match (conns.get(agent_id), session) {
                (Some(conn), Some(s)) if conn.session != s => false,
                (Some(_), _) => conns.remove(agent_id).is_some(),
                (None, _) => false,
            }
        };
        if removed {
            if let Some(record) = self.record(agent_id) {
                record.lock().mark_offline();
            }
            tracing::info!(agent_id = %agent_id, "agent disconnected");
        }
        removed
    }

    /// Live agents whose heartbeat is older than `timeout`
    pub fn stale_agents(&self, timeout: Duration) -> Vec<AgentId> {
        let now = self.clock.epoch_ms();
        let records: Vec<Arc<Mutex<AgentRecord>>> = self.records.read().values().cloned().collect();
        let mut stale: Vec<AgentId> = records
            .iter()
            .filter_map(|r| {
                let r = r.lock();
                r.is_stale(now, timeout).then(|| r.id.clone())
            })
            .collect();
        stale.sort();
        stale
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<AgentRecord> {
        self.record(agent_id).map(|r| r.lock().clone())
    }

    /// All agent records, sorted by id
    pub fn list(&self) -> Vec<AgentRecord> {
        let records: Vec<Arc<Mutex<AgentRecord>>> = self.records.read().values().cloned().collect();
        let mut out: Vec<AgentRecord> = records.iter().map(|r| r.lock().clone()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
