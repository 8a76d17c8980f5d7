// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! weftd: the weft orchestrator daemon

use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use weft_daemon::listener::{self, ListenCtx, Listener};
use weft_daemon::{startup, Config, LifecycleError};
use weft_engine::run_liveness_monitor;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("weftd: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("weftd: failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("daemon failed: {}", e);
            eprintln!("weftd: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to `<state_dir>/weftd.log`; `RUST_LOG` overrides the `info` default.
fn init_logging(config: &Config) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_name = config.log_path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "weftd.log".into());
    let dir = config.log_path.parent().unwrap_or(&config.state_dir);
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(guard)
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let result = startup(&config).await?;
    let mut daemon = result.daemon;
    let shutdown = daemon.shutdown.clone();

    let ctx = Arc::new(ListenCtx { runtime: Arc::clone(&daemon.runtime), shutdown: shutdown.clone() });
    tokio::spawn(Listener::new(result.control, ctx).run());
    tokio::spawn(listener::agents::run(result.agents, Arc::clone(&daemon.runtime), shutdown.clone()));
    tokio::spawn(run_liveness_monitor(
        Arc::clone(&daemon.runtime),
        daemon.config.heartbeat_check,
        shutdown.clone(),
    ));

    println!("READY");
    info!(pid = std::process::id(), "daemon ready");

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    daemon.shutdown()
}
