// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-core: data model shared by the weft orchestrator crates

pub mod macros;

pub mod agent;
pub mod build;
pub mod clock;
pub mod command;
pub mod graph;
pub mod id;
pub mod job;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentId, AgentRecord, AgentStatus, SystemInfo, LOCAL_AGENT_ALIAS, LOCAL_AGENT_NAME};
pub use build::{BuildExecutionState, BuildKey, BuildStatus, NodeExecution, NodeStatus};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{
    AgentScript, BranchTarget, BranchesPlan, Command, CommandKind, MatrixPlan, NotificationPlan,
};
pub use graph::{
    handle, BranchSpec, BranchesConfig, ConditionalConfig, Edge, Graph, MatrixConfig, Node,
    NodeKind, NotificationConfig, ParallelExecution, ParamKind, ParameterNode, RetryPolicy,
    ShellKind, ShellStep, Socket, TriggerContext, TriggerKind, TriggerNode,
};
pub use id::short;
pub use job::{Job, JobConfig, JobId, JobOutcome, JobStatus, TransitionError};
