// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-producing collaborators: planning, generation and repair.
//!
//! Expected failures come back as outcomes with `success == false`; `Err`
//! is reserved for the collaborator itself breaking.

mod command;

pub use command::{CommandAgent, CommandGenerator, CommandPlanner, CommandRepairer};

use crate::subprocess::CommandError;
use async_trait::async_trait;
use mend_core::{Artifact, Job, TaskNode, ValidationResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOutcome {
    pub success: bool,
    pub contract_text: String,
    pub schema_text: String,
    pub error_message: Option<String>,
}

impl PlanOutcome {
    pub fn ok(contract_text: impl Into<String>, schema_text: impl Into<String>) -> Self {
        Self {
            success: true,
            contract_text: contract_text.into(),
            schema_text: schema_text.into(),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOutcome {
    pub success: bool,
    pub artifacts: Vec<Artifact>,
    pub error_message: Option<String>,
}

impl GenerateOutcome {
    pub fn ok(artifacts: Vec<Artifact>) -> Self {
        Self { success: true, artifacts, error_message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairOutcome {
    pub success: bool,
    pub fixed_artifacts: Vec<Artifact>,
    pub error_message: Option<String>,
}

impl RepairOutcome {
    pub fn ok(fixed_artifacts: Vec<Artifact>) -> Self {
        Self { success: true, fixed_artifacts, error_message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Self::default() }
    }

    /// Successful and carrying at least one file
    pub fn is_usable(&self) -> bool {
        self.success && !self.fixed_artifacts.is_empty()
    }
}

/// Collaborator breakage. Displayed verbatim as the job's failure message.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("invalid {stage} output: {message}")]
    Output { stage: &'static str, message: String },
}

/// Turns a requirement into a locked contract
#[async_trait]
pub trait Planner: Send + Sync {
    async fn design(&self, job: &Job) -> Result<PlanOutcome, AgentError>;
}

/// Produces artifacts for a contract, in scheduled task order
#[async_trait]
pub trait Generator: Send + Sync {
    /// Target this generator serves, e.g. `backend`
    fn target_type(&self) -> &str;

    async fn generate(
        &self,
        job: &Job,
        round: u32,
        plan: &[TaskNode],
    ) -> Result<GenerateOutcome, AgentError>;
}

/// Rewrites failing artifacts given the validation history
#[async_trait]
pub trait Repairer: Send + Sync {
    async fn fix(
        &self,
        job: &Job,
        failing: &[Artifact],
        history: &[ValidationResult],
        context: &str,
    ) -> Result<RepairOutcome, AgentError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGenerator, FakePlanner, FakeRepairer, RepairCall};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
