// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host subprocess provider.
//!
//! Each job round gets `<root>/<job_id>/<round>`. Directories outlive the
//! session when used as a fallback and are reclaimed by [`LocalSandbox::sweep`].

use super::{checked_relative_path, ExecOutput, SandboxAdapter, SandboxError, SandboxSession};
use crate::subprocess::{run_with_timeout, CommandOutput};
use async_trait::async_trait;
use mend_core::{Artifact, JobId};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Command;

#[derive(Clone, Debug)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn work_dir(&self, job_id: &JobId, round: u32) -> PathBuf {
        self.root.join(job_id.to_string()).join(round.to_string())
    }

    fn session_dir<'a>(&self, session: &'a SandboxSession) -> Result<&'a Path, SandboxError> {
        session
            .work_dir
            .as_deref()
            .ok_or_else(|| SandboxError::NoSession(format!("{} has no work dir", session.id)))
    }

    /// Remove round directories last modified before `older_than` ago.
    ///
    /// Empty job directories are removed too. Returns the number of round
    /// directories deleted.
    pub fn sweep(&self, older_than: Duration) -> std::io::Result<usize> {
        let cutoff = SystemTime::now().checked_sub(older_than).unwrap_or(UNIX_EPOCH);
        let jobs = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for job_dir in jobs.flatten() {
            if !job_dir.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            for round_dir in std::fs::read_dir(job_dir.path())?.flatten() {
                let modified = round_dir.metadata().and_then(|m| m.modified()).unwrap_or(UNIX_EPOCH);
                if modified <= cutoff {
                    std::fs::remove_dir_all(round_dir.path())?;
                    removed += 1;
                }
            }
            let empty = std::fs::read_dir(job_dir.path())?.next().is_none();
            if empty {
                std::fs::remove_dir(job_dir.path())?;
            }
        }
        if removed > 0 {
            tracing::info!(root = %self.root.display(), removed, "swept local sandbox directories");
        }
        Ok(removed)
    }
}

#[async_trait]
impl SandboxAdapter for LocalSandbox {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn create(&self, job_id: &JobId, round: u32) -> Result<SandboxSession, SandboxError> {
        let dir = self.work_dir(job_id, round);
        tokio::fs::create_dir_all(&dir).await?;
        let created_at_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        tracing::debug!(%job_id, round, dir = %dir.display(), "created local sandbox");
        Ok(SandboxSession {
            id: format!("local-{}-{}", job_id, round),
            provider: self.name().to_string(),
            endpoint: None,
            work_dir: Some(dir),
            created_at_ms,
        })
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        let dir = self.session_dir(session)?;
        for artifact in artifacts {
            let target = dir.join(checked_relative_path(&artifact.path)?);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, artifact.content.as_bytes()).await?;
        }
        Ok(())
    }

    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let dir = self.session_dir(session)?;
        let mut login = Command::new("bash");
        login.arg("-lc").arg(command).current_dir(dir);

        let output = match run_with_timeout(login, timeout, "local build").await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => {
                tracing::debug!("bash unavailable, falling back to sh");
                let mut plain = Command::new("sh");
                plain.arg("-c").arg(command).current_dir(dir);
                run_with_timeout(plain, timeout, "local build").await?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(exec_output(output))
    }

    async fn is_alive(&self, session: &SandboxSession) -> bool {
        match session.work_dir.as_deref() {
            Some(dir) => tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false),
            None => false,
        }
    }

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        let dir = self.session_dir(session)?;
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn exec_output(output: CommandOutput) -> ExecOutput {
    let mut stderr = output.stderr;
    if output.timed_out {
        stderr.push_str("local build timed out\n");
    }
    ExecOutput {
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr,
        duration_ms: output.duration_ms,
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
