// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::Config;
use tempfile::tempdir;
use weft_core::{Job, JobConfig, JobStatus};

fn test_config(dir: &std::path::Path) -> Config {
    Config::in_dir(dir.join("state"))
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.socket_path, b"").unwrap();

    // Hold an exclusive lock (simulating the running daemon)
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.socket_path.exists(), "socket file must not be deleted on LockFailed");
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[tokio::test]
async fn startup_writes_pid_and_binds_listeners() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let result = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(config.socket_path.exists());
    assert_ne!(result.agents.local_addr().unwrap().port(), 0);
    assert!(result.daemon.runtime.agents().list().is_empty());
}

#[tokio::test]
async fn startup_fails_jobs_orphaned_by_previous_run() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    let orphan = {
        let store = FileStore::open(&config.state_dir).unwrap();
        let mut job = Job::new(JobConfig::new("proj", 1, vec![]), &SystemClock);
        job.transition(JobStatus::Running, 1).unwrap();
        store.save_job(&job).unwrap();
        job
    };

    let result = startup(&config).await.unwrap();

    let job = result.daemon.runtime.job(&orphan.id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let reopened = FileStore::open(&config.state_dir).unwrap();
    assert_eq!(reopened.job_status(&orphan.id).unwrap(), Some(JobStatus::Failed));
}

#[tokio::test]
async fn startup_loads_agents_file() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.agents_path, "[[agents]]\nid = \"a1\"\nname = \"Local Agent\"\ntoken = \"t\"\n")
        .unwrap();

    let result = startup(&config).await.unwrap();

    let agents = result.daemon.runtime.agents().list();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id.as_str(), "a1");
}

#[tokio::test]
async fn invalid_agents_file_cleans_up() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.agents_path, "not toml [").unwrap();

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::Config(_)));
    assert!(!config.lock_path.exists());
    assert!(!config.socket_path.exists());
}

#[tokio::test]
async fn shutdown_removes_socket_and_lock() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let mut result = startup(&config).await.unwrap();
    let token = result.daemon.shutdown.clone();
    result.daemon.shutdown().unwrap();

    assert!(token.is_cancelled());
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
}
