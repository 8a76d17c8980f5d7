// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized durable state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use weft_core::{BuildExecutionState, Job, JobStatus};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<String, Job>,
    /// Finished builds keyed by `project#number`
    #[serde(default)]
    pub builds: BTreeMap<String, BuildExecutionState>,
    /// Last issued build number per project
    #[serde(default)]
    pub build_counters: HashMap<String, u64>,
}

impl MaterializedState {
    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn upsert_job(&mut self, job: &Job) {
        self.jobs.insert(job.id.to_string(), job.clone());
    }

    pub fn job_status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.get(id).map(|j| j.status)
    }

    pub fn upsert_build(&mut self, build: &BuildExecutionState) {
        self.builds.insert(build.key().to_string(), build.clone());
        let counter = self.build_counters.entry(build.project_id.clone()).or_default();
        *counter = (*counter).max(build.build_number);
    }

    pub fn next_build_number(&mut self, project_id: &str) -> u64 {
        let counter = self.build_counters.entry(project_id.to_string()).or_default();
        *counter += 1;
        *counter
    }

    /// Jobs that had not finished when the state was last written
    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(|j| j.status.is_active())
    }
}
