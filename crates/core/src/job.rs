// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and state machine.

use crate::agent::AgentId;
use crate::clock::Clock;
use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Every dispatched unit of work gets one, including the sub-jobs that
    /// parallel orchestrators spawn for each branch or matrix item.
    pub struct JobId("job-");
}

/// Cap on buffered output per job; later chunks are dropped.
pub const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Dispatched,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Cancel requested, waiting for the agent to confirm
    Cancelling,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Dispatched => "dispatched",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Cancelling => "cancelling",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Allowed edges of the job state machine.
    ///
    /// `Failed -> Dispatched` exists only for jobs re-sent after their
    /// agent reconnects.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        if *self == to {
            return !self.is_terminal();
        }
        match self {
            Queued => matches!(to, Dispatched | Running | Failed | Cancelling | Cancelled),
            Dispatched => matches!(to, Running | Completed | Failed | Cancelling | Cancelled),
            Running => matches!(to, Dispatched | Completed | Failed | Cancelling | Cancelled),
            Cancelling => matches!(to, Cancelled | Running | Failed | Completed),
            Failed => matches!(to, Dispatched),
            Completed | Cancelled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Final result of a job, delivered to whoever awaits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Parameters for creating a job
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub project_id: String,
    pub build_number: u64,
    pub commands: Vec<Command>,
    pub parent: Option<JobId>,
    pub agent_id: Option<AgentId>,
    pub environment: HashMap<String, String>,
}

impl JobConfig {
    pub fn new(project_id: impl Into<String>, build_number: u64, commands: Vec<Command>) -> Self {
        Self {
            id: JobId::new(),
            project_id: project_id.into(),
            build_number,
            commands,
            parent: None,
            agent_id: None,
            environment: HashMap::new(),
        }
    }

    crate::setters! {
        set {
            id: JobId,
            environment: HashMap<String, String>,
        }
        option {
            parent: JobId,
            agent_id: AgentId,
        }
    }
}

/// One execution of a command sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: String,
    pub build_number: u64,
    pub status: JobStatus,
    pub commands: Vec<Command>,
    /// Index into `commands`; equals `commands.len()` once exhausted
    pub current_command: usize,
    pub agent_id: Option<AgentId>,
    /// Set for branch and matrix sub-jobs
    pub parent: Option<JobId>,
    /// Resolved environment, re-sent unchanged on reassignment
    #[serde(default)]
    pub environment: HashMap<String, String>,
    pub created_at_ms: u64,
    pub dispatched_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    #[serde(default)]
    pub output: String,
    /// Offset in `output` where the current command's output begins
    #[serde(default)]
    pub command_output_start: usize,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub can_retry_on_reconnect: bool,
}

impl Job {
    pub fn new(config: JobConfig, clock: &impl Clock) -> Self {
        Self {
            id: config.id,
            project_id: config.project_id,
            build_number: config.build_number,
            status: JobStatus::Queued,
            commands: config.commands,
            current_command: 0,
            agent_id: config.agent_id,
            parent: config.parent,
            environment: config.environment,
            created_at_ms: clock.epoch_ms(),
            dispatched_at_ms: None,
            finished_at_ms: None,
            output: String::new(),
            command_output_start: 0,
            error: None,
            exit_code: None,
            can_retry_on_reconnect: false,
        }
    }

    pub fn current_command(&self) -> Option<&Command> {
        self.commands.get(self.current_command)
    }

    pub fn is_last_command(&self) -> bool {
        self.current_command + 1 >= self.commands.len()
    }

    pub fn is_sub_job(&self) -> bool {
        self.parent.is_some()
    }

    /// Move to the next command, returning it if one remains.
    pub fn advance(&mut self) -> Option<&Command> {
        if self.current_command < self.commands.len() {
            self.current_command += 1;
        }
        self.current_command()
    }

    /// Apply a status change, stamping dispatch and finish times.
    pub fn transition(&mut self, to: JobStatus, now_ms: u64) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        match to {
            JobStatus::Dispatched => {
                self.dispatched_at_ms = Some(now_ms);
                self.finished_at_ms = None;
            }
            s if s.is_terminal() => self.finished_at_ms = Some(now_ms),
            _ => {}
        }
        Ok(())
    }

    /// Mark the start of a command attempt in the output buffer.
    pub fn begin_attempt(&mut self) {
        self.command_output_start = self.output.len();
    }

    /// Drop output from the current attempt before it is re-sent.
    pub fn rewind_attempt(&mut self) {
        self.output.truncate(self.command_output_start.min(self.output.len()));
    }

    pub fn append_output(&mut self, chunk: &str) {
        let room = MAX_OUTPUT_BYTES.saturating_sub(self.output.len());
        if room == 0 {
            return;
        }
        self.output.push_str(crate::id::short(chunk, room));
    }

    /// Fail a non-terminal job. Returns false if it had already finished.
    pub fn fail(&mut self, error: impl Into<String>, exit_code: Option<i32>, now_ms: u64) -> bool {
        if self.transition(JobStatus::Failed, now_ms).is_err() {
            return false;
        }
        self.error = Some(error.into());
        self.exit_code = exit_code;
        true
    }

    pub fn outcome(&self) -> JobOutcome {
        JobOutcome { status: self.status, exit_code: self.exit_code, error: self.error.clone() }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
