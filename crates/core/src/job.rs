// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity, lifecycle state machine and the locked contract.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for one requirement-to-build execution.
    pub struct JobId;
}

/// Externally visible job state.
///
/// Repair rounds happen inside `Testing`; they are not separate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Planning,
    Coding,
    Testing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Forward edges of the state machine. Any non-terminal state may fail.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Queued, Planning) | (Planning, Coding) | (Coding, Testing) | (Testing, Completed) => {
                true
            }
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

crate::simple_display! {
    JobState {
        Queued => "queued",
        Planning => "planning",
        Coding => "coding",
        Testing => "testing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Planning output. Immutable once locked onto a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_text: String,
    pub schema_text: String,
    pub locked_at_ms: u64,
}

/// Reference to the sandbox session currently bound to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRef {
    pub session_id: String,
    pub provider: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("contract already locked for job {0}")]
    ContractLocked(JobId),
    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// The unit of work owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub requirement: String,
    pub state: JobState,
    pub current_round: u32,
    pub max_rounds: u32,
    contract: Option<Contract>,
    pub sandbox: Option<SandboxRef>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
}

impl Job {
    pub fn new(id: JobId, requirement: impl Into<String>, max_rounds: u32, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        Self {
            id,
            requirement: requirement.into(),
            state: JobState::Queued,
            current_round: 0,
            max_rounds: max_rounds.max(1),
            contract: None,
            sandbox: None,
            last_error: None,
            tenant_id: None,
            user_id: None,
            created_at_ms: now,
            updated_at_ms: now,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    pub fn is_contract_locked(&self) -> bool {
        self.contract.is_some()
    }

    /// Attach the planning contract. A second call is rejected.
    pub fn lock_contract(
        &mut self,
        contract_text: impl Into<String>,
        schema_text: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), JobError> {
        if self.contract.is_some() {
            return Err(JobError::ContractLocked(self.id));
        }
        let now = clock.epoch_ms();
        self.contract = Some(Contract {
            contract_text: contract_text.into(),
            schema_text: schema_text.into(),
            locked_at_ms: now,
        });
        self.updated_at_ms = now;
        Ok(())
    }

    /// Move to `next`, stamping start/finish times.
    pub fn transition(&mut self, next: JobState, clock: &impl Clock) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition { from: self.state, to: next });
        }
        let now = clock.epoch_ms();
        if self.state == JobState::Queued {
            self.started_at_ms = Some(now);
        }
        if next.is_terminal() {
            self.finished_at_ms = Some(now);
        }
        self.state = next;
        self.updated_at_ms = now;
        Ok(())
    }

    /// Terminal failure with a single human-readable message.
    pub fn fail(&mut self, message: impl Into<String>, clock: &impl Clock) -> Result<(), JobError> {
        self.transition(JobState::Failed, clock)?;
        self.last_error = Some(message.into());
        Ok(())
    }

    pub fn set_round(&mut self, round: u32, clock: &impl Clock) {
        self.current_round = round;
        self.updated_at_ms = clock.epoch_ms();
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            requirement: String = "build a todo service",
        }
        set {
            id: JobId = JobId::new(),
            state: JobState = JobState::Queued,
            current_round: u32 = 0,
            max_rounds: u32 = 3,
            contract: Option<Contract> = None,
            sandbox: Option<SandboxRef> = None,
            last_error: Option<String> = None,
            tenant_id: Option<String> = None,
            user_id: Option<String> = None,
        }
        computed {
            created_at_ms: u64 = 1_700_000_000_000,
            updated_at_ms: u64 = 1_700_000_000_000,
            started_at_ms: Option<u64> = None,
            finished_at_ms: Option<u64> = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
