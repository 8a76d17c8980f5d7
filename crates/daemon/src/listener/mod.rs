// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener tasks for socket I/O.
//!
//! The control listener serves local clients over the Unix socket; the
//! agent listener (see [`agents`]) speaks WebSocket to build agents. Both
//! only translate frames into runtime calls.

pub mod agents;

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use weft_core::Graph;
use weft_wire::{self as wire, ProtocolError, Request, Response};

use crate::lifecycle::DaemonRuntime;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub runtime: Arc<DaemonRuntime>,
    pub shutdown: CancellationToken,
}

/// Listener task for accepting control socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the listener loop until shutdown, spawning tasks for each connection.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => {
                    debug!("control listener stopped");
                    return;
                }
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = handle_connection(reader, writer, &ctx).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("Unix accept error: {}", e),
                },
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => debug!("Client disconnected"),
        _ => error!("Connection error: {}", e),
    }
}

/// Serve requests on one connection until the client closes it.
///
/// Generic over reader/writer types so tests can drive it over in-memory pipes.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let request = match wire::read_request(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(ProtocolError::Json(e)) => {
                wire::write_response(&mut writer, &Response::error(format!("invalid request: {e}"))).await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if matches!(request, Request::Ping | Request::JobStatus { .. } | Request::ListAgents) {
            debug!(kind = request_kind(&request), "received request");
        } else {
            info!(kind = request_kind(&request), "received request");
        }

        let response = handle_request(request, ctx).await;
        debug!("Sending response: {:?}", response);
        wire::write_response(&mut writer, &response).await?;
    }
}

fn request_kind(request: &Request) -> &'static str {
    match request {
        Request::Ping => "ping",
        Request::ExecuteGraph { .. } => "execute_graph",
        Request::ExecuteFromTrigger { .. } => "execute_from_trigger",
        Request::CancelJob { .. } => "cancel_job",
        Request::JobStatus { .. } => "job_status",
        Request::ListAgents => "list_agents",
        Request::Shutdown => "shutdown",
    }
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    let runtime = &ctx.runtime;
    match request {
        Request::Ping => Response::Pong,

        Request::ExecuteGraph { project_id, nodes, edges, start_node_id } => {
            let graph = Graph::new(nodes, edges);
            executed(runtime.execute_graph(&project_id, graph, start_node_id.as_deref()).await)
        }

        Request::ExecuteFromTrigger { project_id, nodes, edges, trigger_node_id, trigger_context } => {
            let graph = Graph::new(nodes, edges);
            executed(
                runtime
                    .execute_from_trigger(&project_id, graph, &trigger_node_id, trigger_context)
                    .await,
            )
        }

        Request::CancelJob { job_id } => match runtime.cancel_job(&job_id) {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.to_string()),
        },

        Request::JobStatus { job_id } => Response::Job { job: runtime.job(&job_id).map(Box::new) },

        Request::ListAgents => Response::Agents { agents: runtime.agents().list() },

        Request::Shutdown => {
            info!("shutdown requested");
            ctx.shutdown.cancel();
            Response::Ok
        }
    }
}

fn executed(result: Result<weft_engine::ExecutionTicket, weft_engine::RuntimeError>) -> Response {
    match result {
        Ok(ticket) => Response::Executed {
            job_id: ticket.job_id,
            build_number: ticket.build_number,
            agent_id: ticket.agent_id,
            message: ticket.message,
        },
        Err(e) => {
            tracing::warn!(error = %e, "execution rejected");
            Response::error(e.to_string())
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
