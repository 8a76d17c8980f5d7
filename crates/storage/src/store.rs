// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable job and build storage.

use crate::snapshot::{rotate_bak_path, Snapshot};
use crate::MaterializedState;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use weft_core::{BuildExecutionState, Job, JobId, JobStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable mirror of the job registry and finished builds.
pub trait Store: Send + Sync + 'static {
    fn save_job(&self, job: &Job) -> Result<(), StoreError>;
    fn load_jobs(&self) -> Result<Vec<Job>, StoreError>;
    fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError>;
    fn save_build(&self, build: &BuildExecutionState) -> Result<(), StoreError>;
    fn next_build_number(&self, project_id: &str) -> Result<u64, StoreError>;
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MaterializedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MaterializedState {
        self.state.lock().clone()
    }
}

impl Store for MemoryStore {
    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.state.lock().upsert_job(job);
        Ok(())
    }

    fn load_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.state.lock().jobs.values().cloned().collect())
    }

    fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        Ok(self.state.lock().job_status(id.as_str()))
    }

    fn save_build(&self, build: &BuildExecutionState) -> Result<(), StoreError> {
        self.state.lock().upsert_build(build);
        Ok(())
    }

    fn next_build_number(&self, project_id: &str) -> Result<u64, StoreError> {
        Ok(self.state.lock().next_build_number(project_id))
    }
}

/// Snapshot-file backed store; every mutation rewrites `snapshot.json`.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<MaterializedState>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "snapshot.json";

    /// Load `<dir>/snapshot.json`, moving an unreadable one aside.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);
        let state = match Snapshot::load(&path) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    path = %path.display(),
                    jobs = snapshot.state.jobs.len(),
                    created_at = %snapshot.created_at,
                    "loaded snapshot"
                );
                snapshot.state
            }
            Ok(None) => MaterializedState::default(),
            Err(StoreError::Json(e)) => {
                let bak = rotate_bak_path(&path);
                tracing::warn!(error = %e, backup = %bak.display(), "corrupt snapshot, starting empty");
                std::fs::rename(&path, &bak)?;
                MaterializedState::default()
            }
            Err(e) => return Err(e),
        };
        Ok(Self { path, state: Mutex::new(state) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut MaterializedState) -> T) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        let out = f(&mut state);
        Snapshot::new(state.clone()).save(&self.path)?;
        Ok(out)
    }
}

impl Store for FileStore {
    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.mutate(|s| s.upsert_job(job))
    }

    fn load_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.state.lock().jobs.values().cloned().collect())
    }

    fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        Ok(self.state.lock().job_status(id.as_str()))
    }

    fn save_build(&self, build: &BuildExecutionState) -> Result<(), StoreError> {
        self.mutate(|s| s.upsert_build(build))
    }

    fn next_build_number(&self, project_id: &str) -> Result<u64, StoreError> {
        self.mutate(|s| s.next_build_number(project_id))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
