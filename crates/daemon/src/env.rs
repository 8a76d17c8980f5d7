// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Default address for agent WebSocket connections
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7420";

/// Resolve state directory: WEFT_STATE_DIR > XDG_STATE_HOME/weft > ~/.local/state/weft
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("WEFT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("weft"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/weft"))
}

/// Address the agent WebSocket listener binds
pub fn listen_addr() -> String {
    std::env::var("WEFT_LISTEN_ADDR")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
}

/// Agents file, defaulting to `<state_dir>/agents.toml`
pub fn agents_file(state_dir: &Path) -> PathBuf {
    std::env::var("WEFT_AGENTS_FILE")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| state_dir.join("agents.toml"))
}

/// Silence after which an agent is taken offline (default 60s)
pub fn heartbeat_timeout() -> Duration {
    millis("WEFT_HEARTBEAT_TIMEOUT_MS", Duration::from_secs(60))
}

/// How often the liveness sweep runs (default 15s)
pub fn heartbeat_check_interval() -> Duration {
    millis("WEFT_HEARTBEAT_CHECK_MS", Duration::from_secs(15))
}

/// How long an orchestrator waits on one sub-job (default 1h)
pub fn completion_timeout() -> Duration {
    millis("WEFT_COMPLETION_TIMEOUT_MS", Duration::from_secs(60 * 60))
}

/// How long finished jobs stay in memory (default 1h)
pub fn job_retention() -> Duration {
    millis("WEFT_JOB_RETENTION_MS", Duration::from_secs(60 * 60))
}

fn millis(var: &str, default: Duration) -> Duration {
    parse_millis(std::env::var(var).ok().as_deref(), default)
}

/// Milliseconds from an env value; unset, empty, or malformed gives `default`.
pub(crate) fn parse_millis(value: Option<&str>, default: Duration) -> Duration {
    value
        .map(str::trim)
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
