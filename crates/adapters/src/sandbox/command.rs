// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-supplied sandbox driver.
//!
//! The configured command is invoked as `<command> <verb> [args]` through
//! `sh -c` with these verbs:
//!
//! - `create`: print the new sandbox id on the first stdout line
//! - `sync`: copy `$MEND_STAGING_DIR` into the sandbox
//! - `exec`: run `$MEND_COMMAND` inside the sandbox
//! - `status`: exit 0 while the sandbox is usable
//! - `destroy`: tear the sandbox down

use super::{checked_relative_path, ExecOutput, SandboxAdapter, SandboxError, SandboxSession};
use crate::subprocess::{run_with_timeout, CommandOutput, SHELL_EVAL_TIMEOUT};
use async_trait::async_trait;
use mend_core::{Artifact, JobId};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Command;

#[derive(Clone, Debug)]
pub struct CommandSandbox {
    command: String,
    staging_root: PathBuf,
}

impl CommandSandbox {
    pub fn new(command: impl Into<String>, staging_root: impl Into<PathBuf>) -> Self {
        Self { command: command.into(), staging_root: staging_root.into() }
    }

    fn staging_dir(&self, sandbox_id: &str) -> PathBuf {
        self.staging_root.join(sanitize(sandbox_id))
    }

    fn invocation(&self, verb: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(format!("{} {}", self.command, verb));
        cmd
    }

    async fn run(
        &self,
        verb: &str,
        cmd: Command,
        timeout: Duration,
    ) -> Result<CommandOutput, SandboxError> {
        let description = format!("sandbox command `{verb}`");
        Ok(run_with_timeout(cmd, timeout, &description).await?)
    }

    fn checked(verb: &str, output: CommandOutput) -> Result<CommandOutput, SandboxError> {
        if output.success() {
            return Ok(output);
        }
        let detail = if output.stderr.trim().is_empty() { &output.stdout } else { &output.stderr };
        Err(SandboxError::Protocol(format!(
            "`{verb}` exited with {}: {}",
            output.exit_code,
            detail.trim()
        )))
    }
}

fn sanitize(id: &str) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect()
}

fn env_session(cmd: &mut Command, session: &SandboxSession) {
    cmd.env("MEND_SANDBOX_ID", &session.id);
}

async fn stage(dir: &Path, artifacts: &[Artifact]) -> Result<(), SandboxError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    for artifact in artifacts {
        let target = dir.join(checked_relative_path(&artifact.path)?);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, artifact.content.as_bytes()).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

#[async_trait]
impl SandboxAdapter for CommandSandbox {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn create(&self, job_id: &JobId, round: u32) -> Result<SandboxSession, SandboxError> {
        let mut cmd = self.invocation("create");
        cmd.env("MEND_JOB_ID", job_id.to_string()).env("MEND_ROUND", round.to_string());
        let output = Self::checked("create", self.run("create", cmd, SHELL_EVAL_TIMEOUT).await?)?;
        let id = output.stdout.lines().map(str::trim).find(|l| !l.is_empty()).ok_or_else(|| {
            SandboxError::Protocol("`create` printed no sandbox id".to_string())
        })?;
        tracing::info!(%job_id, sandbox_id = id, "created command sandbox");
        Ok(SandboxSession {
            id: id.to_string(),
            provider: self.name().to_string(),
            endpoint: None,
            work_dir: None,
            created_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        })
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        let dir = self.staging_dir(&session.id);
        stage(&dir, artifacts).await?;
        let mut cmd = self.invocation("sync");
        env_session(&mut cmd, session);
        cmd.env("MEND_STAGING_DIR", &dir);
        Self::checked("sync", self.run("sync", cmd, SHELL_EVAL_TIMEOUT).await?)?;
        Ok(())
    }

    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let mut cmd = self.invocation("exec");
        env_session(&mut cmd, session);
        cmd.env("MEND_COMMAND", command).env("MEND_STAGING_DIR", self.staging_dir(&session.id));
        let output = self.run("exec", cmd, timeout).await?;
        let mut stderr = output.stderr;
        if output.timed_out {
            stderr.push_str("sandbox command timed out\n");
        }
        Ok(ExecOutput {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr,
            duration_ms: output.duration_ms,
        })
    }

    async fn is_alive(&self, session: &SandboxSession) -> bool {
        let mut cmd = self.invocation("status");
        env_session(&mut cmd, session);
        match self.run("status", cmd, SHELL_EVAL_TIMEOUT).await {
            Ok(output) => output.success(),
            Err(e) => {
                tracing::debug!(sandbox_id = %session.id, error = %e, "status check failed");
                false
            }
        }
    }

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        let mut cmd = self.invocation("destroy");
        env_session(&mut cmd, session);
        let result = self.run("destroy", cmd, SHELL_EVAL_TIMEOUT).await.and_then(|o| {
            Self::checked("destroy", o)
        });
        let dir = self.staging_dir(&session.id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove staging dir");
            }
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
