// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators backed by an operator-supplied shell command.
//!
//! The command receives one JSON request on stdin (with `MEND_STAGE` set to
//! `plan`, `generate` or `repair`) and prints the JSON outcome on stdout.

use super::{
    AgentError, GenerateOutcome, Generator, PlanOutcome, Planner, RepairOutcome, Repairer,
};
use crate::subprocess::run_with_input;
use async_trait::async_trait;
use mend_core::{Artifact, Job, JobId, TaskNode, ValidationResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
    timeout: Duration,
    cwd: Option<PathBuf>,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self { command: command.into(), timeout, cwd: None }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    async fn call<Req, Resp>(&self, stage: &'static str, request: &Req) -> Result<Resp, AgentError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let input = serde_json::to_string(request)
            .map_err(|e| AgentError::Output { stage, message: e.to_string() })?;
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command).env("MEND_STAGE", stage);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let description = format!("{stage} agent");
        let output = run_with_input(cmd, Some(&input), self.timeout, &description).await?;
        if output.timed_out {
            return Err(AgentError::Failed(format!(
                "{stage} agent timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if output.exit_code != 0 {
            return Err(AgentError::Failed(format!(
                "{stage} agent exited with {}: {}",
                output.exit_code,
                tail(&output.stderr, STDERR_TAIL_LINES)
            )));
        }
        tracing::debug!(stage, elapsed_ms = output.duration_ms, "agent command finished");
        parse_outcome(stage, &output.stdout)
    }
}

/// Whole stdout as JSON, else the last line that parses
fn parse_outcome<Resp: DeserializeOwned>(
    stage: &'static str,
    stdout: &str,
) -> Result<Resp, AgentError> {
    match serde_json::from_str(stdout.trim()) {
        Ok(outcome) => Ok(outcome),
        Err(e) => stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|l| l.starts_with('{'))
            .find_map(|l| serde_json::from_str(l).ok())
            .ok_or_else(|| AgentError::Output { stage, message: e.to_string() }),
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[derive(Serialize)]
struct PlanRequest<'a> {
    job_id: JobId,
    requirement: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    job_id: JobId,
    requirement: &'a str,
    target_type: &'a str,
    contract_text: Option<&'a str>,
    schema_text: Option<&'a str>,
    round: u32,
    tasks: &'a [TaskNode],
}

#[derive(Serialize)]
struct RepairRequest<'a> {
    job_id: JobId,
    requirement: &'a str,
    contract_text: Option<&'a str>,
    round: u32,
    failing_artifacts: &'a [Artifact],
    validation_history: &'a [ValidationResult],
    repair_context: &'a str,
}

#[derive(Debug, Clone)]
pub struct CommandPlanner(pub CommandAgent);

#[async_trait]
impl Planner for CommandPlanner {
    async fn design(&self, job: &Job) -> Result<PlanOutcome, AgentError> {
        self.0.call("plan", &PlanRequest { job_id: job.id, requirement: &job.requirement }).await
    }
}

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    agent: CommandAgent,
    target_type: String,
}

impl CommandGenerator {
    pub fn new(agent: CommandAgent, target_type: impl Into<String>) -> Self {
        Self { agent, target_type: target_type.into() }
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    async fn generate(
        &self,
        job: &Job,
        round: u32,
        plan: &[TaskNode],
    ) -> Result<GenerateOutcome, AgentError> {
        let contract = job.contract();
        let request = GenerateRequest {
            job_id: job.id,
            requirement: &job.requirement,
            target_type: &self.target_type,
            contract_text: contract.map(|c| c.contract_text.as_str()),
            schema_text: contract.map(|c| c.schema_text.as_str()),
            round,
            tasks: plan,
        };
        self.agent.call("generate", &request).await
    }
}

#[derive(Debug, Clone)]
pub struct CommandRepairer(pub CommandAgent);

#[async_trait]
impl Repairer for CommandRepairer {
    async fn fix(
        &self,
        job: &Job,
        failing: &[Artifact],
        history: &[ValidationResult],
        context: &str,
    ) -> Result<RepairOutcome, AgentError> {
        let request = RepairRequest {
            job_id: job.id,
            requirement: &job.requirement,
            contract_text: job.contract().map(|c| c.contract_text.as_str()),
            round: job.current_round,
            failing_artifacts: failing,
            validation_history: history,
            repair_context: context,
        };
        self.0.call("repair", &request).await
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
