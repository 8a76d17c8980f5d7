// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod cancel;
mod execute;
mod fanout;
mod liveness;
mod recovery;
mod routing;

use super::*;
use crate::test_helpers::*;
use weft_core::test_support::*;
use weft_core::{BuildStatus, JobStatus, NodeStatus};
use weft_wire::{AgentMessage, ServerMessage};

fn script_of(exec: &weft_wire::ExecuteJob) -> &str {
    &exec.commands[0].script
}

fn linear(ids: &[&str]) -> Graph {
    let nodes = ids.iter().map(|id| bash(id, &format!("echo {id}"))).collect();
    let edges = ids.windows(2).map(|w| edge(w[0], w[1])).collect();
    Graph::new(nodes, edges)
}
