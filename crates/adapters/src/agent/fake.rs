// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    AgentError, GenerateOutcome, Generator, PlanOutcome, Planner, RepairOutcome, Repairer,
};
use async_trait::async_trait;
use mend_core::{Artifact, Job, JobId, TaskNode, ValidationResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Planner returning a fixed outcome, or failing with a fixed message
#[derive(Clone)]
pub struct FakePlanner {
    outcome: Result<PlanOutcome, String>,
    calls: Arc<Mutex<Vec<JobId>>>,
}

impl FakePlanner {
    pub fn new(outcome: PlanOutcome) -> Self {
        Self { outcome: Ok(outcome), calls: Arc::default() }
    }

    pub fn with_schema(schema_text: impl Into<String>) -> Self {
        Self::new(PlanOutcome::ok("REST API over the schema", schema_text))
    }

    /// `design` returns `Err(AgentError::Failed(message))`
    pub fn erroring(message: impl Into<String>) -> Self {
        Self { outcome: Err(message.into()), calls: Arc::default() }
    }

    pub fn calls(&self) -> Vec<JobId> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Planner for FakePlanner {
    async fn design(&self, job: &Job) -> Result<PlanOutcome, AgentError> {
        self.calls.lock().push(job.id);
        self.outcome.clone().map_err(AgentError::Failed)
    }
}

/// Generator returning a fixed artifact set
#[derive(Clone)]
pub struct FakeGenerator {
    target_type: String,
    outcome: GenerateOutcome,
    plans: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeGenerator {
    pub fn new(target_type: impl Into<String>, artifacts: Vec<Artifact>) -> Self {
        Self::with_outcome(target_type, GenerateOutcome::ok(artifacts))
    }

    pub fn with_outcome(target_type: impl Into<String>, outcome: GenerateOutcome) -> Self {
        Self { target_type: target_type.into(), outcome, plans: Arc::default() }
    }

    /// Task ids of each received plan, in call order
    pub fn plans(&self) -> Vec<Vec<String>> {
        self.plans.lock().clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    async fn generate(
        &self,
        _job: &Job,
        _round: u32,
        plan: &[TaskNode],
    ) -> Result<GenerateOutcome, AgentError> {
        self.plans.lock().push(plan.iter().map(|n| n.id.clone()).collect());
        Ok(self.outcome.clone())
    }
}

/// Recorded `fix` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCall {
    pub round: u32,
    pub failing_paths: Vec<String>,
    pub history_len: usize,
    pub context: String,
}

struct FakeRepairerState {
    scripted: VecDeque<Result<RepairOutcome, String>>,
    calls: Vec<RepairCall>,
}

/// Repairer replaying scripted outcomes.
///
/// Once the script runs out it "fixes" every failing file by bumping its
/// version without changing content, so a broken build stays broken.
#[derive(Clone)]
pub struct FakeRepairer {
    inner: Arc<Mutex<FakeRepairerState>>,
}

impl Default for FakeRepairer {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRepairerState {
                scripted: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeRepairer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: RepairOutcome) {
        self.inner.lock().scripted.push_back(Ok(outcome));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.inner.lock().scripted.push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<RepairCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl Repairer for FakeRepairer {
    async fn fix(
        &self,
        job: &Job,
        failing: &[Artifact],
        history: &[ValidationResult],
        context: &str,
    ) -> Result<RepairOutcome, AgentError> {
        let mut state = self.inner.lock();
        state.calls.push(RepairCall {
            round: job.current_round,
            failing_paths: failing.iter().map(|a| a.path.clone()).collect(),
            history_len: history.len(),
            context: context.to_string(),
        });
        match state.scripted.pop_front() {
            Some(outcome) => outcome.map_err(AgentError::Failed),
            None => Ok(RepairOutcome::ok(
                failing
                    .iter()
                    .map(|a| {
                        Artifact::new(a.path.clone(), a.content.clone())
                            .agent("repair")
                            .round(job.current_round + 1)
                            .version(a.version + 1)
                    })
                    .collect(),
            )),
        }
    }
}
