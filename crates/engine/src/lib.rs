// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-engine: graph compiler, registries and the orchestrator runtime

pub mod agents;
pub mod compiler;
pub mod error;
pub mod hooks;
pub mod jobs;
pub mod monitor;
pub mod runtime;
pub mod tracker;

#[cfg(test)]
mod test_helpers;

pub use agents::{AgentRegistry, AgentSession, AgentTx, KnownAgent};
pub use compiler::{compile, CompileError, CompileOptions, ConditionError};
pub use error::{AuthError, RuntimeError};
pub use hooks::{BroadcastEvent, Broadcaster, BuildLifecycle, ExecutionObserver, Hooks, Notifier, NotifyError};
pub use jobs::JobRegistry;
pub use monitor::{run_liveness_monitor, SweepReport};
pub use runtime::{
    ExecutionTicket, FanOutSummary, Runtime, RuntimeConfig, RuntimeDeps, SubJobResult, BUILD_NUMBER_VAR,
    PROJECT_ID_VAR,
};
pub use tracker::ExecutionTracker;
