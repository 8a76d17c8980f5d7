// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime error types

use crate::compiler::CompileError;
use thiserror::Error;
use weft_core::{AgentId, JobId, TransitionError};
use weft_storage::StoreError;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("no available agent ({0})")]
    AgentUnavailable(String),
    #[error("failed to dispatch job {job} to agent {agent}")]
    DispatchFailed { job: JobId, agent: AgentId },
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("trigger node not found: {0}")]
    TriggerNotFound(String),
    #[error("job {0} already has a completion waiter")]
    DuplicateWaiter(JobId),
    #[error("orchestrator failed: {0}")]
    Orchestrator(String),
    #[error("build lifecycle error: {0}")]
    Lifecycle(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Agent authentication failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid agent token")]
    InvalidToken,
    #[error("agent {0} is not authenticated")]
    NotAuthenticated(AgentId),
}
