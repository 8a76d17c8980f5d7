// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job registry and one-shot completion waiters.

use crate::error::RuntimeError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use weft_core::{AgentId, Job, JobId, JobOutcome};

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
    waiters: Mutex<HashMap<JobId, oneshot::Sender<JobOutcome>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id.clone(), Arc::new(Mutex::new(job)));
    }

    /// Copy of the current job state
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.entry(id).map(|j| j.lock().clone())
    }

    fn entry(&self, id: &JobId) -> Option<Arc<Mutex<Job>>> {
        self.jobs.read().get(id).cloned()
    }

    /// Mutate one job under its own lock.
    pub fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Result<R, RuntimeError> {
        let entry = self.entry(id).ok_or_else(|| RuntimeError::JobNotFound(id.clone()))?;
        let mut job = entry.lock();
        Ok(f(&mut job))
    }

    fn filtered(&self, pred: impl Fn(&Job) -> bool) -> Vec<Job> {
        let entries: Vec<Arc<Mutex<Job>>> = self.jobs.read().values().cloned().collect();
        let mut jobs: Vec<Job> = entries
            .iter()
            .filter_map(|e| {
                let job = e.lock();
                pred(&job).then(|| job.clone())
            })
            .collect();
        jobs.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn all(&self) -> Vec<Job> {
        self.filtered(|_| true)
    }

    /// Non-terminal jobs currently assigned to `agent_id`
    pub fn active_on(&self, agent_id: &AgentId) -> Vec<Job> {
        self.filtered(|j| j.status.is_active() && j.agent_id.as_ref() == Some(agent_id))
    }

    /// Failed jobs waiting for `agent_id` to come back
    pub fn retryable_for(&self, agent_id: &AgentId) -> Vec<Job> {
        self.filtered(|j| j.can_retry_on_reconnect && j.agent_id.as_ref() == Some(agent_id))
    }

    /// Direct children of `parent`
    pub fn children(&self, parent: &JobId) -> Vec<Job> {
        self.filtered(|j| j.parent.as_ref() == Some(parent))
    }

    /// Install the single completion waiter for a job.
    pub fn watch(&self, id: &JobId) -> Result<oneshot::Receiver<JobOutcome>, RuntimeError> {
        let mut waiters = self.waiters.lock();
        if waiters.contains_key(id) {
            return Err(RuntimeError::DuplicateWaiter(id.clone()));
        }
        let (tx, rx) = oneshot::channel();
        waiters.insert(id.clone(), tx);
        Ok(rx)
    }

    /// Deliver the outcome to the waiter, if any. Returns whether one was waiting.
    pub fn resolve(&self, id: &JobId, outcome: JobOutcome) -> bool {
        match self.waiters.lock().remove(id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn unwatch(&self, id: &JobId) {
        self.waiters.lock().remove(id);
    }

    /// Drop terminal jobs that finished more than `retention` ago.
    ///
    /// Jobs kept for reconnect retry stay regardless of age.
    pub fn evict_terminal(&self, now_ms: u64, retention: Duration) -> Vec<JobId> {
        let cutoff = retention.as_millis() as u64;
        let mut jobs = self.jobs.write();
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, entry)| {
                let job = entry.lock();
                job.status.is_terminal()
                    && !job.can_retry_on_reconnect
                    && job.finished_at_ms.is_some_and(|t| now_ms.saturating_sub(t) > cutoff)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
