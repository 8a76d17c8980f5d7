// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry points for the agent transport

use super::Runtime;
use crate::agents::{AgentSession, AgentTx};
use crate::error::AuthError;
use crate::hooks::BroadcastEvent;
use std::sync::Arc;
use weft_core::{Clock, JobId, SystemInfo};
use weft_wire::{AgentMessage, ServerMessage};

impl<C: Clock> Runtime<C> {
    /// Authenticate a new connection and answer on it.
    pub fn connect_agent(&self, token: &str, tx: AgentTx) -> Result<AgentSession, AuthError> {
        match self.agents.authenticate(token, tx.clone()) {
            Ok(session) => {
                let _ = tx.send(ServerMessage::Authenticated { agent_id: session.agent_id.clone() });
                self.hooks.broadcaster.broadcast(BroadcastEvent::AgentConnected {
                    agent_id: session.agent_id.clone(),
                });
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "agent authentication failed");
                let _ = tx.send(ServerMessage::AuthError { message: e.to_string() });
                Err(e)
            }
        }
    }

    /// Route one message from an authenticated agent. Errors are logged
    /// here and never returned to the transport.
    pub async fn on_agent_message(self: &Arc<Self>, session: &AgentSession, msg: AgentMessage) {
        let agent_id = &session.agent_id;
        tracing::debug!(agent_id = %agent_id, kind = msg.kind(), "agent message");
        if let Some(job_id) = msg.job_id() {
            if !self.owns_job(session, job_id) {
                tracing::warn!(agent_id = %agent_id, job_id = %job_id, kind = msg.kind(), "message for job not assigned to agent");
                return;
            }
        }

        let result = match msg {
            AgentMessage::Authenticate { .. } => {
                tracing::debug!(agent_id = %agent_id, "already authenticated");
                Ok(())
            }
            AgentMessage::Register(registration) => {
                let system: SystemInfo = registration.into();
                match self.agents.register(agent_id, system) {
                    Ok(()) => {
                        self.agents.send(agent_id, ServerMessage::Registered { agent_id: agent_id.clone() });
                        self.agent_registered(agent_id).await;
                    }
                    Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "register rejected"),
                }
                Ok(())
            }
            AgentMessage::Heartbeat { status, current_jobs } => {
                self.agents.heartbeat(agent_id, status.as_deref(), current_jobs);
                Ok(())
            }
            AgentMessage::JobOutput { job_id, output } => self.handle_job_output(&job_id, &output),
            AgentMessage::JobComplete { job_id, exit_code, output } => {
                self.handle_job_complete(&job_id, exit_code, output.as_deref()).await
            }
            AgentMessage::JobError { job_id, error, exit_code } => {
                self.handle_job_error(&job_id, &error, exit_code).await;
                Ok(())
            }
            AgentMessage::JobStatus { job_id, status, message } => {
                self.handle_job_status(&job_id, status, message.as_deref()).await
            }
        };
        if let Err(e) = result {
            tracing::warn!(agent_id = %agent_id, error = %e, "agent message failed");
        }
    }

    /// Connection closed: drop it and handle the agent's orphaned jobs.
    pub async fn agent_disconnected(self: &Arc<Self>, session: &AgentSession) {
        if !self.agents.disconnect(&session.agent_id, Some(session.session)) {
            return;
        }
        self.hooks.broadcaster.broadcast(BroadcastEvent::AgentDisconnected {
            agent_id: session.agent_id.clone(),
        });
        self.agent_lost(&session.agent_id).await;
    }

    fn owns_job(&self, session: &AgentSession, job_id: &JobId) -> bool {
        match self.jobs.get(job_id) {
            Some(job) => job.agent_id.as_ref() == Some(&session.agent_id),
            None => false,
        }
    }
}
