// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

mod startup;
pub use startup::{reconcile_state, startup, startup_with, Collaborators};

use std::path::{Path, PathBuf};

use mend_adapters::{SandboxAdapter, SandboxError, SandboxRouter};
use mend_core::{ConfigError, Job, JobState, PipelineConfig, SystemClock};
use mend_engine::{Orchestrator, OrchestratorError};
use mend_storage::{JobStore, MemoryJobStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::env;

/// Orchestrator with the daemon's concrete store and clock
pub type DaemonOrchestrator<S> = Orchestrator<S, MemoryJobStore, SystemClock>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory (set MEND_STATE_DIR or HOME)")]
    NoStateDir,
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("requirement must not be empty")]
    EmptyRequirement,
    #[error("failed to initialise logging: {0}")]
    Logging(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon file layout
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/mend)
    pub state_dir: PathBuf,
    /// Job store snapshot
    pub snapshot_path: PathBuf,
    /// Optional TOML pipeline config
    pub config_path: Option<PathBuf>,
    /// Rolling log directory; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve paths from the `MEND_*` environment
    pub fn load() -> Result<Self, LifecycleError> {
        let mut config = Self::at(env::state_dir()?);
        config.config_path = env::config_path();
        config.log_dir = env::log_dir();
        Ok(config)
    }

    /// Layout rooted at `state_dir` with no config file or log directory
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            snapshot_path: state_dir.join("jobs.json"),
            state_dir,
            config_path: None,
            log_dir: None,
        }
    }
}

/// Read the pipeline config (defaults when no file) and apply env overrides
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig, LifecycleError> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    env::apply_overrides(&mut config)?;
    Ok(config)
}

/// Printed by `mendd` when a job finishes
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub state: JobState,
    pub rounds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub artifacts: Vec<String>,
}

/// Running daemon: one orchestrator over a snapshot-backed store
pub struct Daemon<S: SandboxAdapter = SandboxRouter> {
    pub config: Config,
    pub pipeline: PipelineConfig,
    pub orchestrator: DaemonOrchestrator<S>,
    store: MemoryJobStore,
    shutdown: CancellationToken,
}

impl<S: SandboxAdapter> Daemon<S> {
    pub fn store(&self) -> &MemoryJobStore {
        &self.store
    }

    /// Cancelling this interrupts in-flight builds
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Create a job for `requirement`, drive it to a terminal state and
    /// persist the store.
    pub async fn run_requirement(&self, requirement: &str) -> Result<Job, LifecycleError> {
        if requirement.trim().is_empty() {
            return Err(LifecycleError::EmptyRequirement);
        }
        let job = self.orchestrator.create_job(requirement.trim())?;
        let result = self.orchestrator.run(job.id).await;
        self.save();
        Ok(result?)
    }

    pub fn summary(&self, job: &Job) -> Result<JobSummary, LifecycleError> {
        let artifacts = self.store.latest_artifacts(&job.id)?.into_iter().map(|a| a.path).collect();
        Ok(JobSummary {
            job_id: job.id.to_string(),
            state: job.state,
            rounds: job.current_round,
            error: job.last_error.clone(),
            artifacts,
        })
    }

    /// Write the store snapshot; failures are logged, not propagated
    pub fn save(&self) {
        if let Err(e) = self.store.save_snapshot(&self.config.snapshot_path) {
            warn!(path = %self.config.snapshot_path.display(), error = %e, "failed to save snapshot");
        }
    }

    pub fn shutdown(&self) {
        info!("shutting down");
        self.shutdown.cancel();
        self.save();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
