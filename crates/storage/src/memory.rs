// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`JobStore`] with optional JSON snapshots.

use crate::store::{JobStore, StoreError};
use mend_core::{Artifact, Job, JobId, LogEntry, ValidationResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Everything the store holds, serializable as one snapshot
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub jobs: HashMap<JobId, Job>,
    /// Every artifact version in insertion order
    #[serde(default)]
    pub artifacts: HashMap<JobId, Vec<Artifact>>,
    #[serde(default)]
    pub validations: HashMap<JobId, Vec<ValidationResult>>,
    #[serde(default)]
    pub logs: HashMap<JobId, Vec<LogEntry>>,
}

#[derive(Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<Mutex<StoreState>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a snapshot written by [`save_snapshot`](Self::save_snapshot).
    /// A missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let state = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), jobs = state.jobs.len(), "loaded store snapshot");
        Ok(Self { inner: Arc::new(Mutex::new(state)) })
    }

    /// Write atomically via a temp file + rename
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&*self.inner.lock())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl JobStore for MemoryJobStore {
    fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        if state.jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        match state.jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(StoreError::JobNotFound(job.id)),
        }
    }

    fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().jobs.get(id).cloned())
    }

    fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self.inner.lock().jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at_ms);
        Ok(jobs)
    }

    fn insert_artifacts(&self, id: &JobId, artifacts: &[Artifact]) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        if !state.jobs.contains_key(id) {
            return Err(StoreError::JobNotFound(*id));
        }
        state.artifacts.entry(*id).or_default().extend(artifacts.iter().cloned());
        Ok(())
    }

    fn latest_artifacts(&self, id: &JobId) -> Result<Vec<Artifact>, StoreError> {
        let state = self.inner.lock();
        let Some(all) = state.artifacts.get(id) else {
            return Ok(Vec::new());
        };
        let mut order: Vec<&str> = Vec::new();
        let mut latest: HashMap<&str, &Artifact> = HashMap::new();
        for artifact in all {
            if latest.insert(artifact.path.as_str(), artifact).is_none() {
                order.push(artifact.path.as_str());
            }
        }
        Ok(order.into_iter().filter_map(|p| latest.get(p).map(|a| (*a).clone())).collect())
    }

    fn insert_validation(&self, result: &ValidationResult) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        if !state.jobs.contains_key(&result.job_id) {
            return Err(StoreError::JobNotFound(result.job_id));
        }
        state.validations.entry(result.job_id).or_default().push(result.clone());
        Ok(())
    }

    fn validations(&self, id: &JobId) -> Result<Vec<ValidationResult>, StoreError> {
        Ok(self.inner.lock().validations.get(id).cloned().unwrap_or_default())
    }

    fn append_log(&self, id: &JobId, entry: &LogEntry) -> Result<(), StoreError> {
        self.inner.lock().logs.entry(*id).or_default().push(entry.clone());
        Ok(())
    }

    fn logs(&self, id: &JobId) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self.inner.lock().logs.get(id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
