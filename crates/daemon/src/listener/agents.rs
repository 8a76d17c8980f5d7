// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport for build agents.
//!
//! Each connection must open with an `authenticate` frame. After that every
//! text frame is parsed and handed to the runtime in arrival order, while a
//! writer task drains the session's outbound queue onto the socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use weft_engine::AgentSession;
use weft_wire::{parse_agent_message, to_text, AgentMessage, ServerMessage};

use crate::lifecycle::DaemonRuntime;

/// How long a rejected connection gets to receive its `auth_error`
const REJECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AgentConnError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("connection closed before authenticating")]
    ClosedBeforeAuth,

    #[error("expected authenticate, got {0}")]
    NotAuthenticated(&'static str),

    #[error("invalid agent frame: {0}")]
    InvalidFrame(#[from] weft_wire::ProtocolError),

    #[error("authentication rejected")]
    Rejected,
}

/// Accept agent connections until shutdown.
pub async fn run(listener: TcpListener, runtime: Arc<DaemonRuntime>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("agent listener stopped");
                return;
            }
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    debug!(%addr, "agent connection");
                    let runtime = Arc::clone(&runtime);
                    tokio::spawn(async move {
                        if let Err(e) = serve_agent(stream, runtime).await {
                            warn!(%addr, error = %e, "agent connection ended");
                        }
                    });
                }
                Err(e) => error!("agent accept error: {}", e),
            },
        }
    }
}

/// Run one agent connection to completion.
pub async fn serve_agent<S>(stream: S, runtime: Arc<DaemonRuntime>) -> Result<(), AgentConnError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut frames) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match to_text(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(kind = msg.kind(), error = %e, "failed to encode server message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let token = match first_token(&mut frames).await {
        Ok(token) => token,
        Err(e) => {
            writer.abort();
            return Err(e);
        }
    };
    let session = match runtime.connect_agent(&token, tx) {
        Ok(session) => session,
        Err(_) => {
            // The auth_error frame is queued; let the writer deliver it.
            let _ = tokio::time::timeout(REJECT_FLUSH_TIMEOUT, &mut writer).await;
            writer.abort();
            return Err(AgentConnError::Rejected);
        }
    };
    info!(agent_id = %session.agent_id, session = session.session, "agent authenticated");

    let result = read_loop(&mut frames, &session, &runtime).await;

    info!(agent_id = %session.agent_id, "agent disconnected");
    runtime.agent_disconnected(&session).await;
    writer.abort();
    result
}

/// Wait for the opening `authenticate` frame.
async fn first_token<S>(frames: &mut S) -> Result<String, AgentConnError>
where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match frames.next().await {
            Some(Ok(Message::Text(text))) => {
                return match parse_agent_message(text.as_str())? {
                    AgentMessage::Authenticate { token } => Ok(token),
                    other => Err(AgentConnError::NotAuthenticated(other.kind())),
                };
            }
            Some(Ok(Message::Close(_))) | None => return Err(AgentConnError::ClosedBeforeAuth),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn read_loop<S>(
    frames: &mut S,
    session: &AgentSession,
    runtime: &Arc<DaemonRuntime>,
) -> Result<(), AgentConnError>
where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match frames.next().await {
            Some(Ok(Message::Text(text))) => match parse_agent_message(text.as_str()) {
                Ok(msg) => runtime.on_agent_message(session, msg).await,
                Err(e) => warn!(agent_id = %session.agent_id, error = %e, "dropping malformed frame"),
            },
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
