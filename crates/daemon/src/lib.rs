// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! weft daemon library: configuration, lifecycle and the two listeners
//! that put the orchestrator runtime on the network.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod listener;

#[cfg(test)]
mod test_helpers;

pub use lifecycle::{startup, Config, DaemonRuntime, DaemonState, LifecycleError, StartupResult};
