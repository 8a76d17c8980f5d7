// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocols spoken by the weft daemon.
//!
//! - Agent protocol: JSON text frames over WebSocket, tagged by `type`
//! - Control protocol: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod agent;
mod request;
mod response;
mod wire;

pub use agent::{
    parse_agent_message, to_text, AgentMessage, ExecuteJob, Registration, ReportedStatus,
    Sequence, ServerMessage,
};
pub use request::Request;
pub use response::Response;
pub use wire::{decode, encode, read_message, write_message, ProtocolError, MAX_MESSAGE_SIZE};
pub use wire::{read_request, write_response};
