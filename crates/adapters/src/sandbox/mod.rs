// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build sandbox providers.
//!
//! A provider materializes artifacts into an isolated working directory and
//! runs commands there. [`SandboxRouter`] selects one by configuration.

mod command;
mod local;
mod remote;

pub use command::CommandSandbox;
pub use local::LocalSandbox;
pub use remote::RemoteSandbox;

use crate::subprocess::CommandError;
use async_trait::async_trait;
use mend_core::{Artifact, JobId, SandboxConfig, SandboxProviderKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// An ephemeral execution context bound to one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSession {
    pub id: String,
    pub provider: String,
    pub endpoint: Option<String>,
    /// Host directory for providers that run on this machine
    pub work_dir: Option<PathBuf>,
    pub created_at_ms: u64,
}

/// Raw result of a command run inside a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Errors from sandbox providers.
///
/// Display strings carry the phrases the build classifier matches:
/// `no active sandbox`, `sandbox id mismatch` and `command failed`.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("no active sandbox: {0}")]
    NoSession(String),
    #[error("sandbox id mismatch: expected {expected}, got {actual}")]
    SessionMismatch { expected: String, actual: String },
    #[error("command failed: {0}")]
    Command(#[from] CommandError),
    #[error("i/o error on {method} request to {path}: {message}")]
    Request { method: &'static str, path: String, message: String },
    #[error("sandbox provider returned HTTP {status} for {path}: {body}")]
    Status { status: u16, path: String, body: String },
    #[error("unexpected provider response: {0}")]
    Protocol(String),
    #[error("artifact path escapes sandbox: {0}")]
    PathEscape(String),
    #[error("sandbox i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sandbox provider not configured: {0}")]
    NotConfigured(String),
    #[error("blocked by policy: {0}")]
    Blocked(String),
    #[error("interrupted by shutdown")]
    Interrupted,
}

/// A build context provider
#[async_trait]
pub trait SandboxAdapter: Clone + Send + Sync + 'static {
    /// Provider name recorded on sessions and results
    fn name(&self) -> &'static str;

    /// Provision a fresh session. `round` lets host providers separate
    /// per-round working copies.
    async fn create(&self, job_id: &JobId, round: u32) -> Result<SandboxSession, SandboxError>;

    /// Materialize `artifacts` into the session's working directory
    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError>;

    /// Run `command` in the working directory
    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError>;

    async fn is_alive(&self, session: &SandboxSession) -> bool;

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError>;
}

/// Relative artifact path safe to join under a sandbox root
pub(crate) fn checked_relative_path(path: &str) -> Result<PathBuf, SandboxError> {
    let candidate = std::path::Path::new(path);
    let escapes = candidate.is_absolute()
        || candidate.components().any(|c| {
            matches!(c, std::path::Component::ParentDir | std::path::Component::Prefix(_))
        });
    if escapes || path.trim().is_empty() {
        return Err(SandboxError::PathEscape(path.to_string()));
    }
    Ok(candidate.to_path_buf())
}

/// Config-selected provider
#[derive(Clone)]
pub enum SandboxRouter {
    Remote(RemoteSandbox),
    Local(LocalSandbox),
    Command(CommandSandbox),
}

impl SandboxRouter {
    pub fn from_config(config: &SandboxConfig) -> Result<Self, SandboxError> {
        Ok(match config.provider {
            SandboxProviderKind::Remote => Self::Remote(RemoteSandbox::from_config(config)?),
            SandboxProviderKind::Local => Self::Local(LocalSandbox::new(config.local_root.clone())),
            SandboxProviderKind::Command => {
                if config.external_command.trim().is_empty() {
                    return Err(SandboxError::NotConfigured(
                        "sandbox.external_command is empty".to_string(),
                    ));
                }
                Self::Command(CommandSandbox::new(
                    config.external_command.clone(),
                    config.local_root.join("staging"),
                ))
            }
        })
    }
}

macro_rules! route {
    ($self:ident, $s:ident => $call:expr) => {
        match $self {
            SandboxRouter::Remote($s) => $call,
            SandboxRouter::Local($s) => $call,
            SandboxRouter::Command($s) => $call,
        }
    };
}

#[async_trait]
impl SandboxAdapter for SandboxRouter {
    fn name(&self) -> &'static str {
        route!(self, s => s.name())
    }

    async fn create(&self, job_id: &JobId, round: u32) -> Result<SandboxSession, SandboxError> {
        route!(self, s => s.create(job_id, round).await)
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        route!(self, s => s.write_files(session, artifacts).await)
    }

    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        route!(self, s => s.exec(session, command, timeout).await)
    }

    async fn is_alive(&self, session: &SandboxSession) -> bool {
        route!(self, s => s.is_alive(session).await)
    }

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        route!(self, s => s.destroy(session).await)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSandbox, SandboxCall};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
