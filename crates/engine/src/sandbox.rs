// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox execution service.
//!
//! Owns the per-job session cache and turns a set of artifacts into a
//! classified [`BuildResult`]. Environment failures are retried in place,
//! or after recreating the session when the failure points at a broken
//! session, and may fall back to a host build when configured. Code
//! failures are returned immediately for repair.

use crate::compiler::{classify, environment_failure, failure_snippet, should_reset_session};
use crate::hooks::HookPipeline;
use crate::log_stream::JobLogSink;
use mend_adapters::{ExecOutput, LocalSandbox, SandboxAdapter, SandboxError, SandboxSession};
use mend_core::{
    Artifact, BuildResult, Clock, HookContext, HookEvent, Job, JobId, LogEntry, LogRole,
    SandboxConfig, SandboxProviderKind,
};
use mend_storage::TtlCache;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SETUP_FAILED: &str = "sandbox setup failed";
const EXEC_FAILED: &str = "sandbox command failed";

/// Where sessions for a run of attempts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    /// Reuse the job's cached session while it is alive
    Cached,
    /// Fresh session per run, never cached and never destroyed
    Ephemeral,
}

pub struct SandboxService<S: SandboxAdapter, C: Clock> {
    provider: S,
    fallback: Option<LocalSandbox>,
    sessions: TtlCache<JobId, SandboxSession, C>,
    config: SandboxConfig,
    hooks: HookPipeline,
    shutdown: CancellationToken,
}

impl<S: SandboxAdapter, C: Clock> SandboxService<S, C> {
    pub fn new(
        provider: S,
        config: SandboxConfig,
        hooks: HookPipeline,
        clock: C,
        shutdown: CancellationToken,
    ) -> Self {
        let fallback = (config.allow_local_fallback
            && config.provider != SandboxProviderKind::Local
            && provider.name() != "local")
            .then(|| LocalSandbox::new(config.local_root.clone()));
        Self {
            provider,
            fallback,
            sessions: TtlCache::new(config.session_ttl(), clock),
            config,
            hooks,
            shutdown,
        }
    }

    pub fn provider(&self) -> &S {
        &self.provider
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Session currently cached for `job_id`
    pub fn session(&self, job_id: &JobId) -> Option<SandboxSession> {
        self.sessions.get(job_id)
    }

    /// Provision a new session for `job` and cache it, replacing any
    /// previous one without destroying it.
    pub async fn create_session(
        &self,
        job: &Job,
        log: &dyn JobLogSink,
    ) -> Result<SandboxSession, SandboxError> {
        let session = self.provider.create(&job.id, job.current_round).await?;
        tracing::info!(
            job_id = %job.id,
            session_id = %session.id,
            provider = %session.provider,
            "sandbox created"
        );
        log.emit(
            &job.id,
            LogEntry::info(
                LogRole::System,
                format!("sandbox created: {} ({})", session.id, session.provider),
            ),
        );
        self.sessions.insert(job.id, session.clone());
        Ok(session)
    }

    /// Materialize `artifacts` into `session`
    pub async fn sync_artifacts(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        self.provider.write_files(session, artifacts).await
    }

    /// Run the configured build once in `session` on the primary provider
    pub async fn build(&self, job: &Job, session: &SandboxSession) -> Result<BuildResult, SandboxError> {
        self.build_with(&self.provider, job, session).await
    }

    pub async fn is_session_alive(&self, job_id: &JobId) -> bool {
        match self.sessions.get(job_id) {
            Some(session) => self.provider.is_alive(&session).await,
            None => false,
        }
    }

    /// Run an arbitrary command in the job's cached session
    pub async fn execute_command(
        &self,
        job_id: &JobId,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let session = self
            .sessions
            .get(job_id)
            .ok_or_else(|| SandboxError::NoSession(job_id.to_string()))?;
        self.provider.exec(&session, command, timeout).await
    }

    /// Drop and destroy the job's session. Never fails; provider errors are
    /// logged.
    pub async fn destroy_session(&self, job_id: &JobId) {
        let Some(session) = self.sessions.remove(job_id) else {
            return;
        };
        match self.provider.destroy(&session).await {
            Ok(()) => tracing::info!(%job_id, session_id = %session.id, "sandbox destroyed"),
            Err(e) => tracing::warn!(
                %job_id,
                session_id = %session.id,
                error = %e,
                "failed to destroy sandbox"
            ),
        }
    }

    /// Compile `artifacts` for `job`, retrying environment failures.
    ///
    /// Only policy blocks and shutdown surface as `Err`; every provider
    /// failure is folded into an environment-error [`BuildResult`].
    pub async fn compile(
        &self,
        job: &Job,
        artifacts: &[Artifact],
        log: &dyn JobLogSink,
    ) -> Result<BuildResult, SandboxError> {
        let mut result =
            self.run_attempts(&self.provider, SessionMode::Cached, job, artifacts, log).await?;

        if result.is_environment_error() {
            if let Some(local) = &self.fallback {
                tracing::warn!(job_id = %job.id, "remote build unavailable, falling back to local");
                log.emit(
                    &job.id,
                    LogEntry::warn(
                        LogRole::Validator,
                        "sandbox unavailable, falling back to a local build",
                    ),
                );
                result =
                    self.run_attempts(local, SessionMode::Ephemeral, job, artifacts, log).await?;
            }
        }

        if !result.success {
            for line in failure_snippet(&result.combined_output()) {
                log.emit(&job.id, LogEntry::warn(LogRole::Validator, line));
            }
        }
        Ok(result)
    }

    async fn run_attempts<A: SandboxAdapter>(
        &self,
        adapter: &A,
        mode: SessionMode,
        job: &Job,
        artifacts: &[Artifact],
        log: &dyn JobLogSink,
    ) -> Result<BuildResult, SandboxError> {
        let max_attempts = self.config.env_error_max_retries.max(1);
        let mut session: Option<SandboxSession> = None;
        let mut last = None;

        for attempt in 1..=max_attempts {
            if self.shutdown.is_cancelled() {
                return Err(SandboxError::Interrupted);
            }

            let prepared = self.prepare(adapter, mode, job, artifacts, &mut session, log).await;
            let (result, reset) = match prepared {
                Ok(active) => {
                    let result = self.build_with(adapter, job, &active).await?;
                    let reset = should_reset_session(&result);
                    (result, reset)
                }
                Err(e) => (environment_failure(SETUP_FAILED, e.to_string(), adapter.name()), true),
            };

            if result.success {
                log.emit(
                    &job.id,
                    LogEntry::success(
                        LogRole::Validator,
                        format!("build passed on {} (attempt {attempt})", result.provider),
                    ),
                );
                return Ok(result);
            }
            if !result.is_environment_error() {
                log.emit(
                    &job.id,
                    LogEntry::info(
                        LogRole::Validator,
                        format!(
                            "code error detected ({} errors), handing to repair",
                            result.error_count()
                        ),
                    ),
                );
                return Ok(result);
            }

            let reason = result.environment_reason.clone().unwrap_or_default();
            tracing::warn!(
                job_id = %job.id,
                provider = adapter.name(),
                attempt,
                max_attempts,
                reason = %reason,
                reset,
                "environment error during build"
            );
            log.emit(
                &job.id,
                LogEntry::warn(
                    LogRole::Validator,
                    format!("environment error (attempt {attempt}/{max_attempts}): {reason}"),
                ),
            );
            last = Some(result);
            if attempt == max_attempts {
                break;
            }

            if reset {
                self.reset(adapter, mode, job, &mut session, log).await;
            }
            self.pause().await?;
        }

        log.emit(
            &job.id,
            LogEntry::error(
                LogRole::Validator,
                format!("environment error persisted after {max_attempts} attempts"),
            ),
        );
        Ok(last.unwrap_or_else(|| {
            environment_failure(SETUP_FAILED, "no attempts made", adapter.name())
        }))
    }

    /// Acquire a usable session and write the artifacts into it
    async fn prepare<A: SandboxAdapter>(
        &self,
        adapter: &A,
        mode: SessionMode,
        job: &Job,
        artifacts: &[Artifact],
        session: &mut Option<SandboxSession>,
        log: &dyn JobLogSink,
    ) -> Result<SandboxSession, SandboxError> {
        let active = match session.take() {
            Some(active) => active,
            None => self.acquire(adapter, mode, job, log).await?,
        };
        adapter.write_files(&active, artifacts).await?;
        *session = Some(active.clone());
        Ok(active)
    }

    async fn acquire<A: SandboxAdapter>(
        &self,
        adapter: &A,
        mode: SessionMode,
        job: &Job,
        log: &dyn JobLogSink,
    ) -> Result<SandboxSession, SandboxError> {
        if mode == SessionMode::Cached {
            if let Some(cached) = self.sessions.get(&job.id) {
                if adapter.is_alive(&cached).await {
                    self.sessions.refresh(&job.id);
                    return Ok(cached);
                }
                tracing::info!(job_id = %job.id, session_id = %cached.id, "cached sandbox is gone");
                self.sessions.remove(&job.id);
            }
        }

        let created = adapter.create(&job.id, job.current_round).await?;
        tracing::info!(
            job_id = %job.id,
            session_id = %created.id,
            provider = %created.provider,
            "sandbox created"
        );
        log.emit(
            &job.id,
            LogEntry::info(
                LogRole::System,
                format!("sandbox created: {} ({})", created.id, created.provider),
            ),
        );
        if mode == SessionMode::Cached {
            self.sessions.insert(job.id, created.clone());
        }
        Ok(created)
    }

    /// Forget the current session so the next attempt starts from scratch
    async fn reset<A: SandboxAdapter>(
        &self,
        adapter: &A,
        mode: SessionMode,
        job: &Job,
        session: &mut Option<SandboxSession>,
        log: &dyn JobLogSink,
    ) {
        let stale = session.take();
        if mode == SessionMode::Ephemeral {
            return;
        }
        let stale = self.sessions.remove(&job.id).or(stale);
        if let Some(stale) = stale {
            log.emit(
                &job.id,
                LogEntry::warn(LogRole::System, format!("resetting sandbox {}", stale.id)),
            );
            if let Err(e) = adapter.destroy(&stale).await {
                tracing::warn!(
                    job_id = %job.id,
                    session_id = %stale.id,
                    error = %e,
                    "failed to destroy stale sandbox"
                );
            }
        }
    }

    async fn pause(&self) -> Result<(), SandboxError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(SandboxError::Interrupted),
            _ = tokio::time::sleep(self.config.retry_delay()) => Ok(()),
        }
    }

    async fn build_with<A: SandboxAdapter>(
        &self,
        adapter: &A,
        job: &Job,
        session: &SandboxSession,
    ) -> Result<BuildResult, SandboxError> {
        let command = self.config.build_command.as_str();
        let ctx = HookContext::tool(HookEvent::BeforeTool, "compile", command)
            .for_job(job)
            .metadata("provider", adapter.name())
            .metadata("session_id", session.id.clone());
        let decision = self.hooks.before_tool(&ctx);
        if decision.is_blocked() {
            let after = ctx
                .with_event(HookEvent::AfterTool)
                .success(false)
                .error_message(decision.reason());
            self.hooks.after_tool(&after, &decision);
            return Err(SandboxError::Blocked(decision.reason().to_string()));
        }

        let exec = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(SandboxError::Interrupted),
            exec = adapter.exec(session, command, self.config.compile_timeout()) => exec,
        };
        let result = match exec {
            Ok(output) => classify(&output, adapter.name()),
            Err(e) => environment_failure(EXEC_FAILED, e.to_string(), adapter.name()),
        };

        let after = ctx
            .with_event(HookEvent::AfterTool)
            .success(result.success)
            .exit_code(result.exit_code)
            .duration_ms(result.duration_ms);
        let after = match &result.environment_reason {
            Some(reason) => after.error_message(reason.clone()),
            None => after,
        };
        self.hooks.after_tool(&after, &decision);
        Ok(result)
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
