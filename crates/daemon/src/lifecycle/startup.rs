// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::info;
use weft_core::SystemClock;
use weft_engine::{Hooks, Runtime, RuntimeDeps};
use weft_storage::{FileStore, Store};

use super::{Config, DaemonState, LifecycleError, StartupResult};
use crate::config::load_agents;

/// Bring the daemon up: lock, recover, bind.
///
/// On failure the socket and PID file are removed again, unless the lock was
/// held by another daemon that owns them.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    let result = start(config).await;
    if let Err(ref e) = result {
        if !matches!(e, LifecycleError::LockFailed(_)) {
            cleanup_on_failure(config);
        }
    }
    result
}

async fn start(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let lock_file = acquire_lock(config)?;

    // Durable state and the agents allowed to connect
    let store: Arc<dyn Store> = Arc::new(FileStore::open(&config.state_dir)?);
    let agents = load_agents(&config.agents_path)?;

    // Jobs left in flight by the previous run can never report back
    let runtime = Runtime::new(
        RuntimeDeps { hooks: Hooks::with_store(Arc::clone(&store)), store, agents },
        config.runtime.clone(),
        SystemClock,
    );
    let orphaned = runtime.recover_on_startup()?;
    if orphaned > 0 {
        info!(count = orphaned, "failed jobs orphaned by previous run");
    }

    // Listeners go last so a failed start never accepts a client
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let control = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    let agents = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| LifecycleError::ListenFailed(config.listen_addr.clone(), e))?;

    info!(
        socket = %config.socket_path.display(),
        agents = %agents.local_addr().map(|a| a.to_string()).unwrap_or_default(),
        "Daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            runtime,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        },
        control,
        agents,
    })
}

/// Exclusive lock on the PID file, then record our PID in it.
///
/// The file is opened without truncation: a daemon that loses the race must
/// not wipe the winner's PID.
fn acquire_lock(config: &Config) -> Result<File, LifecycleError> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()?;
    Ok(file)
}

fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
