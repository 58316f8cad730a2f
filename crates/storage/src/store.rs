// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam called synchronously at every job transition.

use mend_core::{Artifact, Job, JobId, LogEntry, ValidationResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("job already exists: {0}")]
    Duplicate(JobId),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Job, artifact, validation-result and log storage.
///
/// Artifacts are versioned: every insert appends, and
/// [`latest_artifacts`](JobStore::latest_artifacts) returns the newest
/// version per path in first-seen path order.
pub trait JobStore: Clone + Send + Sync + 'static {
    fn insert_job(&self, job: &Job) -> Result<(), StoreError>;
    fn update_job(&self, job: &Job) -> Result<(), StoreError>;
    fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;
    fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    fn insert_artifacts(&self, id: &JobId, artifacts: &[Artifact]) -> Result<(), StoreError>;
    fn latest_artifacts(&self, id: &JobId) -> Result<Vec<Artifact>, StoreError>;

    fn insert_validation(&self, result: &ValidationResult) -> Result<(), StoreError>;
    fn validations(&self, id: &JobId) -> Result<Vec<ValidationResult>, StoreError>;

    fn append_log(&self, id: &JobId, entry: &LogEntry) -> Result<(), StoreError>;
    fn logs(&self, id: &JobId) -> Result<Vec<LogEntry>, StoreError>;
}
