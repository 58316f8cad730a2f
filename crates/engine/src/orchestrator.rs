// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine and the validate/repair loop.
//!
//! `QUEUED -> PLANNING -> CODING -> TESTING -> COMPLETED | FAILED`. Testing
//! is re-entered through the repair sub-loop, bounded by the job's round
//! limit. Every transition is persisted and logged before the next step
//! starts. Sandbox teardown and log-stream close run whatever the outcome.

use crate::graph::{build_graph, topological_sort, GraphError};
use crate::log_stream::{JobLogSink, LogHub, LogSubscription};
use crate::memory::{RepairAttempt, SessionMemory, SessionMemoryStore};
use crate::signature::{error_signature, error_type_description};
use crate::validation::{failing_artifacts, ValidationPipeline};
use mend_adapters::{
    AgentError, Generator, Planner, RepairOutcome, Repairer, SandboxAdapter, SandboxError,
};
use mend_core::{
    merge_artifacts, next_revisions, Artifact, Clock, CyclePolicy, ErrorClass, Job, JobError,
    JobId, JobState, LogEntry, LogRole, OrchestratorConfig, SandboxRef, ValidationResult,
};
use mend_storage::{JobStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

/// `agent` recorded on repaired artifacts
pub const REPAIR_AGENT: &str = "repair";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Collaborators and shared registries the orchestrator is built from
pub struct OrchestratorDeps<S: SandboxAdapter, St: JobStore, C: Clock> {
    pub store: St,
    pub logs: LogHub<St>,
    pub planner: Arc<dyn Planner>,
    pub generator: Arc<dyn Generator>,
    pub repairer: Arc<dyn Repairer>,
    pub validation: ValidationPipeline<S, C>,
    pub memory: SessionMemoryStore<C>,
}

/// Drives jobs end to end. Clones share state.
pub struct Orchestrator<S: SandboxAdapter, St: JobStore, C: Clock> {
    inner: Arc<Inner<S, St, C>>,
}

impl<S: SandboxAdapter, St: JobStore, C: Clock> Clone for Orchestrator<S, St, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<S: SandboxAdapter, St: JobStore, C: Clock> {
    store: St,
    logs: LogHub<St>,
    planner: Arc<dyn Planner>,
    generator: Arc<dyn Generator>,
    repairer: Arc<dyn Repairer>,
    validation: ValidationPipeline<S, C>,
    memory: SessionMemoryStore<C>,
    config: OrchestratorConfig,
    cycle_policy: CyclePolicy,
    clock: C,
}

/// How the repair loop ended
enum LoopEnd {
    Passed,
    Failed(String),
}

impl<S: SandboxAdapter, St: JobStore, C: Clock> Orchestrator<S, St, C> {
    pub fn new(
        deps: OrchestratorDeps<S, St, C>,
        config: OrchestratorConfig,
        cycle_policy: CyclePolicy,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: deps.store,
                logs: deps.logs,
                planner: deps.planner,
                generator: deps.generator,
                repairer: deps.repairer,
                validation: deps.validation,
                memory: deps.memory,
                config,
                cycle_policy,
                clock,
            }),
        }
    }

    /// Create a queued job without running it
    pub fn create_job(&self, requirement: &str) -> Result<Job, OrchestratorError> {
        let inner = &self.inner;
        let job = Job::new(JobId::new(), requirement, inner.config.max_rounds, &inner.clock);
        inner.store.insert_job(&job)?;
        tracing::info!(job_id = %job.id, max_rounds = job.max_rounds, "job created");
        inner.logs.emit(&job.id, LogEntry::info(LogRole::System, "job queued"));
        Ok(job)
    }

    /// Create a job and run it in the background. Returns immediately.
    pub fn submit(&self, requirement: &str) -> Result<JobId, OrchestratorError> {
        let job = self.create_job(requirement)?;
        let this = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            if let Err(e) = this.run(job_id).await {
                tracing::error!(%job_id, error = %e, "job run aborted");
            }
        });
        Ok(job_id)
    }

    /// Run `job_id` to a terminal state and return the final snapshot.
    ///
    /// Collaborator and sandbox errors fail the job rather than surfacing
    /// here; `Err` means the job could not be loaded. At most one concurrent
    /// call per job.
    pub async fn run(&self, job_id: JobId) -> Result<Job, OrchestratorError> {
        let mut job = self.get_job(&job_id)?.ok_or(OrchestratorError::NotFound(job_id))?;
        if job.state.is_terminal() {
            return Ok(job);
        }

        let span = tracing::info_span!("job", job_id = %job_id);
        async {
            let start = self.inner.clock.now();
            if let Err(e) = self.drive(&mut job).await {
                tracing::error!(error = %e, "job failed with error");
                self.fail(&mut job, e.to_string());
            }
            self.teardown(&job).await;
            tracing::info!(
                state = %job.state,
                rounds = job.current_round,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "job finished"
            );
        }
        .instrument(span)
        .await;
        Ok(job)
    }

    pub fn get_job(&self, job_id: &JobId) -> Result<Option<Job>, OrchestratorError> {
        Ok(self.inner.store.get_job(job_id)?)
    }

    /// Latest version of every artifact
    pub fn get_artifacts(&self, job_id: &JobId) -> Result<Vec<Artifact>, OrchestratorError> {
        Ok(self.inner.store.latest_artifacts(job_id)?)
    }

    pub fn validations(&self, job_id: &JobId) -> Result<Vec<ValidationResult>, OrchestratorError> {
        Ok(self.inner.store.validations(job_id)?)
    }

    /// Persisted log history, then live entries until the job ends
    pub fn subscribe_logs(&self, job_id: &JobId) -> Result<LogSubscription, OrchestratorError> {
        Ok(self.inner.logs.subscribe(job_id)?)
    }

    async fn drive(&self, job: &mut Job) -> Result<(), OrchestratorError> {
        let inner = &self.inner;

        self.advance(job, JobState::Planning, LogRole::Planner, "designing contract")?;
        let plan = inner.planner.design(job).await?;
        if !plan.success {
            let message = plan.error_message.unwrap_or_else(|| "planning failed".to_string());
            self.fail(job, message);
            return Ok(());
        }
        job.lock_contract(plan.contract_text, plan.schema_text, &inner.clock)?;
        inner.store.update_job(job)?;
        inner.logs.emit(&job.id, LogEntry::success(LogRole::Planner, "contract locked"));

        self.advance(job, JobState::Coding, LogRole::Coder, "generating code")?;
        let schema = job.contract().map(|c| c.schema_text.clone()).unwrap_or_default();
        let graph = build_graph(&schema);
        let tasks = topological_sort(&graph, inner.cycle_policy)?;
        inner.logs.emit(
            &job.id,
            LogEntry::info(
                LogRole::Coder,
                format!(
                    "scheduled {} tasks for {} tables ({})",
                    tasks.len(),
                    graph.tables.len(),
                    inner.generator.target_type()
                ),
            ),
        );
        let generated = inner.generator.generate(job, job.current_round, &tasks).await?;
        if !generated.success {
            let message =
                generated.error_message.unwrap_or_else(|| "code generation failed".to_string());
            self.fail(job, message);
            return Ok(());
        }
        if generated.artifacts.is_empty() {
            self.fail(job, "code generation produced no artifacts");
            return Ok(());
        }
        inner.store.insert_artifacts(&job.id, &generated.artifacts)?;
        inner.logs.emit(
            &job.id,
            LogEntry::success(
                LogRole::Coder,
                format!("generated {} files", generated.artifacts.len()),
            ),
        );

        self.advance(job, JobState::Testing, LogRole::Validator, "validating build")?;
        match self.repair_loop(job, generated.artifacts).await? {
            LoopEnd::Passed => {
                self.advance(job, JobState::Completed, LogRole::System, "job completed")?;
            }
            LoopEnd::Failed(message) => self.fail(job, message),
        }
        Ok(())
    }

    /// Validate, then repair and re-validate until the build passes or the
    /// round budget runs out
    async fn repair_loop(
        &self,
        job: &mut Job,
        mut artifacts: Vec<Artifact>,
    ) -> Result<LoopEnd, OrchestratorError> {
        let inner = &self.inner;
        let mut memory = inner.memory.get_or_create(job.id);
        let mut history: Vec<ValidationResult> = inner.store.validations(&job.id)?;
        let mut validations = 0u32;
        let mut repairs = 0u32;
        let mut env_failures = 0u32;

        loop {
            let report = inner.validation.validate(job, &artifacts, &inner.logs).await?;
            validations += 1;
            inner.store.insert_validation(&report.result)?;
            self.record_sandbox(job)?;
            artifacts = report.artifacts;
            let result = report.result;
            history.push(result.clone());

            if result.passed {
                return Ok(LoopEnd::Passed);
            }
            if result.compile_passed() {
                return Ok(LoopEnd::Failed(result.detail));
            }

            let environment = result.error_class == ErrorClass::EnvironmentError;
            if environment {
                env_failures += 1;
            }
            if job.current_round + 1 >= job.max_rounds {
                let message = if environment && repairs == 0 {
                    format!(
                        "build validation failed ({validations} validations): \
                         environment errors detected, no repair triggered"
                    )
                } else {
                    format!(
                        "build validation failed ({validations} validations, {repairs} repairs): \
                         exhausted after {repairs} repair rounds"
                    )
                };
                return Ok(LoopEnd::Failed(message));
            }

            if environment {
                inner.logs.emit(
                    &job.id,
                    LogEntry::warn(
                        LogRole::System,
                        format!(
                            "environment error in round {}, skipping repair ({env_failures} so far)",
                            job.current_round
                        ),
                    ),
                );
                self.next_round(job)?;
                continue;
            }

            let failing = failing_artifacts(&artifacts);
            if failing.is_empty() {
                return Ok(LoopEnd::Failed("cannot localize failing files".to_string()));
            }

            let signature = error_signature(&result.parsed_errors, &result.output);
            let error_type = error_type_description(&result.output);
            if inner.config.stop_on_repeated_error && memory.is_repeated(&signature) {
                memory.record_signature(&signature);
                inner.memory.save(&memory);
                return Ok(LoopEnd::Failed(format!(
                    "same error repeated {} times ({error_type}), stopping repair",
                    memory.consecutive_same()
                )));
            }
            memory.record_signature(&signature);

            let outcome = self
                .repair(job, &failing, &history, &mut memory, signature, error_type)
                .await?;
            if !outcome.is_usable() {
                let message = outcome
                    .error_message
                    .unwrap_or_else(|| "repair produced no usable fix".to_string());
                return Ok(LoopEnd::Failed(message));
            }

            let fixed = next_revisions(
                &artifacts,
                &outcome.fixed_artifacts,
                REPAIR_AGENT,
                job.current_round + 1,
            );
            artifacts = merge_artifacts(&artifacts, &fixed);
            inner.store.insert_artifacts(&job.id, &fixed)?;
            repairs += 1;
            inner.logs.emit(
                &job.id,
                LogEntry::success(
                    LogRole::Repair,
                    format!("applied {} fixed files (repair {repairs})", fixed.len()),
                ),
            );
            self.next_round(job)?;
        }
    }

    async fn repair(
        &self,
        job: &Job,
        failing: &[Artifact],
        history: &[ValidationResult],
        memory: &mut SessionMemory,
        signature: String,
        error_type: &str,
    ) -> Result<RepairOutcome, OrchestratorError> {
        let inner = &self.inner;
        let files: Vec<String> = failing.iter().map(|a| a.file_name().to_string()).collect();
        inner.logs.emit(
            &job.id,
            LogEntry::info(
                LogRole::Repair,
                format!(
                    "repairing {} files in round {}: {}",
                    files.len(),
                    job.current_round,
                    files.join(", ")
                ),
            ),
        );

        let context = memory.repair_context();
        let outcome = inner.repairer.fix(job, failing, history, &context).await?;
        memory.record_attempt(RepairAttempt {
            round: job.current_round,
            timestamp_ms: inner.clock.epoch_ms(),
            files,
            success: outcome.is_usable(),
            error_signature: Some(signature),
            error_type: error_type.to_string(),
            summary: outcome.error_message.clone(),
        });
        inner.memory.save(memory);
        Ok(outcome)
    }

    /// Persist, then log, a state change
    fn advance(
        &self,
        job: &mut Job,
        next: JobState,
        role: LogRole,
        message: &str,
    ) -> Result<(), OrchestratorError> {
        let from = job.state;
        job.transition(next, &self.inner.clock)?;
        self.inner.store.update_job(job)?;
        tracing::info!(%from, to = %next, round = job.current_round, "job transition");
        let entry = if next == JobState::Completed {
            LogEntry::success(role, message)
        } else {
            LogEntry::info(role, message)
        };
        self.inner.logs.emit(&job.id, entry);
        Ok(())
    }

    fn next_round(&self, job: &mut Job) -> Result<(), OrchestratorError> {
        job.set_round(job.current_round + 1, &self.inner.clock);
        self.inner.store.update_job(job)?;
        self.inner.logs.emit(
            &job.id,
            LogEntry::info(
                LogRole::Validator,
                format!("round {} of {}", job.current_round + 1, job.max_rounds),
            ),
        );
        Ok(())
    }

    fn record_sandbox(&self, job: &mut Job) -> Result<(), OrchestratorError> {
        let Some(session) = self.inner.validation.sandbox().session(&job.id) else {
            return Ok(());
        };
        if job.sandbox.as_ref().map(|s| s.session_id.as_str()) == Some(session.id.as_str()) {
            return Ok(());
        }
        job.sandbox = Some(SandboxRef {
            session_id: session.id,
            provider: session.provider,
            endpoint: session.endpoint,
        });
        self.inner.store.update_job(job)?;
        Ok(())
    }

    /// Terminal failure. Persistence problems are logged, never raised.
    fn fail(&self, job: &mut Job, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = job.fail(message.clone(), &self.inner.clock) {
            tracing::warn!(error = %e, "cannot mark job failed");
            return;
        }
        if let Err(e) = self.inner.store.update_job(job) {
            tracing::warn!(error = %e, "failed to persist failed job");
        }
        tracing::warn!(round = job.current_round, reason = %message, "job failed");
        self.inner
            .logs
            .emit(&job.id, LogEntry::error(LogRole::System, format!("job failed: {message}")));
    }

    async fn teardown(&self, job: &Job) {
        self.inner.validation.sandbox().destroy_session(&job.id).await;
        self.inner.logs.close(&job.id);
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
