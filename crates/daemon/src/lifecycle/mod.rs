// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, startup and shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weft_core::SystemClock;
use weft_engine::{Runtime, RuntimeConfig, RuntimeError};
use weft_storage::StoreError;

use crate::config::ConfigError;
use crate::env;

/// Daemon runtime with the wall clock
pub type DaemonRuntime = Runtime<SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/weft)
    pub state_dir: PathBuf,
    /// Path to the control socket
    pub socket_path: PathBuf,
    /// Exclusive lock, holds the daemon PID
    pub lock_path: PathBuf,
    /// `tracing` output
    pub log_path: PathBuf,
    /// Agents allowed to connect
    pub agents_path: PathBuf,
    /// Address for agent WebSocket connections
    pub listen_addr: String,
    /// Interval of the heartbeat sweep
    pub heartbeat_check: Duration,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration for the user-level daemon from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let runtime = RuntimeConfig::default()
            .heartbeat_timeout(env::heartbeat_timeout())
            .completion_timeout(env::completion_timeout())
            .job_retention(env::job_retention());
        Ok(Self {
            agents_path: env::agents_file(&state_dir),
            listen_addr: env::listen_addr(),
            heartbeat_check: env::heartbeat_check_interval(),
            runtime,
            ..Self::in_dir(state_dir)
        })
    }

    /// Default layout under `state_dir`, agents on an ephemeral local port.
    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("weftd.sock"),
            lock_path: state_dir.join("weftd.pid"),
            log_path: state_dir.join("weftd.log"),
            agents_path: state_dir.join("agents.toml"),
            listen_addr: "127.0.0.1:0".to_string(),
            heartbeat_check: Duration::from_secs(15),
            runtime: RuntimeConfig::default(),
            state_dir,
        }
    }
}

/// Daemon state during operation.
///
/// Listeners are returned separately from startup to be spawned as tasks.
pub struct DaemonState {
    pub config: Config,
    // Lock is released when the file drops
    #[allow(dead_code)]
    lock_file: File,
    pub runtime: Arc<DaemonRuntime>,
    /// Fired by a `Shutdown` request or a signal
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

/// Result of daemon startup
pub struct StartupResult {
    pub daemon: DaemonState,
    /// Control socket for local clients
    pub control: UnixListener,
    /// WebSocket listener for agents
    pub agents: TcpListener,
}

impl DaemonState {
    /// Shutdown the daemon gracefully.
    ///
    /// Jobs still in flight stay persisted as non-terminal and are failed by
    /// the next startup's recovery.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("daemon stopping");
        self.shutdown.cancel();

        for path in [&self.config.socket_path, &self.config.lock_path] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove daemon file"),
            }
        }

        info!(uptime_secs = self.start_time.elapsed().as_secs(), "daemon stopped");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no state directory: set WEFT_STATE_DIR or HOME")]
    NoStateDir,

    #[error("another weftd holds the lock")]
    LockFailed(#[source] std::io::Error),

    #[error("cannot bind control socket {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("cannot listen for agents on {0}: {1}")]
    ListenFailed(String, std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("runtime: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
