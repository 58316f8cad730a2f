// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator wrappers that report each call as a tool event.

use super::mask::truncate;
use super::HookPipeline;
use async_trait::async_trait;
use mend_adapters::{
    AgentError, GenerateOutcome, Generator, PlanOutcome, Planner, RepairOutcome, Repairer,
};
use mend_core::{Artifact, HookContext, HookEvent, Job, TaskNode, ValidationResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub const PLAN_TOOL: &str = "plan_agent";
pub const GENERATE_TOOL: &str = "generate_agent";
pub const REPAIR_TOOL: &str = "repair_agent";

/// Outcome fields the `after` hook reports
trait Reported {
    fn succeeded(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

impl Reported for PlanOutcome {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl Reported for GenerateOutcome {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl Reported for RepairOutcome {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[derive(Clone)]
struct Guard {
    hooks: HookPipeline,
    max_payload_chars: usize,
}

impl Guard {
    fn context(&self, tool: &str, job: &Job, input: &str) -> HookContext {
        HookContext::tool(HookEvent::BeforeTool, tool, truncate(input, self.max_payload_chars))
            .for_job(job)
            .metadata("round", job.current_round.to_string())
    }

    /// Ask the `before` hooks, run `call` only when allowed, then report
    async fn run<T, F, Fut>(&self, ctx: HookContext, call: F) -> Result<T, AgentError>
    where
        T: Reported,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let decision = self.hooks.before_tool(&ctx);
        if decision.is_blocked() {
            let after = ctx
                .clone()
                .with_event(HookEvent::AfterTool)
                .success(false)
                .error_message(decision.reason());
            self.hooks.after_tool(&after, &decision);
            let tool = ctx.tool_name.as_deref().unwrap_or("agent");
            return Err(AgentError::Failed(format!("{tool} blocked: {}", decision.reason())));
        }

        let start = Instant::now();
        let result = call().await;
        let after = ctx
            .with_event(HookEvent::AfterTool)
            .duration_ms(start.elapsed().as_millis() as u64);
        let after = match &result {
            Ok(outcome) => match outcome.error() {
                Some(message) => after.success(outcome.succeeded()).error_message(message),
                None => after.success(outcome.succeeded()),
            },
            Err(e) => after.success(false).error_message(e.to_string()),
        };
        self.hooks.after_tool(&after, &decision);
        result
    }
}

/// [`Planner`] whose calls pass through the hook pipeline.
///
/// A blocked call never reaches the inner planner and surfaces as
/// [`AgentError::Failed`] carrying the hook's reason.
#[derive(Clone)]
pub struct HookedPlanner {
    inner: Arc<dyn Planner>,
    guard: Guard,
}

impl HookedPlanner {
    pub fn new(inner: Arc<dyn Planner>, hooks: HookPipeline, max_payload_chars: usize) -> Self {
        Self { inner, guard: Guard { hooks, max_payload_chars } }
    }
}

#[async_trait]
impl Planner for HookedPlanner {
    async fn design(&self, job: &Job) -> Result<PlanOutcome, AgentError> {
        let ctx = self.guard.context(PLAN_TOOL, job, &job.requirement);
        self.guard.run(ctx, || self.inner.design(job)).await
    }
}

#[derive(Clone)]
pub struct HookedGenerator {
    inner: Arc<dyn Generator>,
    guard: Guard,
}

impl HookedGenerator {
    pub fn new(inner: Arc<dyn Generator>, hooks: HookPipeline, max_payload_chars: usize) -> Self {
        Self { inner, guard: Guard { hooks, max_payload_chars } }
    }
}

#[async_trait]
impl Generator for HookedGenerator {
    fn target_type(&self) -> &str {
        self.inner.target_type()
    }

    async fn generate(
        &self,
        job: &Job,
        round: u32,
        plan: &[TaskNode],
    ) -> Result<GenerateOutcome, AgentError> {
        let ctx = self
            .guard
            .context(GENERATE_TOOL, job, &job.requirement)
            .metadata("target_type", self.inner.target_type())
            .metadata("tasks", plan.len().to_string());
        self.guard.run(ctx, || self.inner.generate(job, round, plan)).await
    }
}

#[derive(Clone)]
pub struct HookedRepairer {
    inner: Arc<dyn Repairer>,
    guard: Guard,
}

impl HookedRepairer {
    pub fn new(inner: Arc<dyn Repairer>, hooks: HookPipeline, max_payload_chars: usize) -> Self {
        Self { inner, guard: Guard { hooks, max_payload_chars } }
    }
}

#[async_trait]
impl Repairer for HookedRepairer {
    async fn fix(
        &self,
        job: &Job,
        failing: &[Artifact],
        history: &[ValidationResult],
        context: &str,
    ) -> Result<RepairOutcome, AgentError> {
        let files: Vec<&str> = failing.iter().map(|a| a.path.as_str()).collect();
        let ctx = self.guard.context(REPAIR_TOOL, job, &files.join(", "));
        self.guard.run(ctx, || self.inner.fix(job, failing, history, context)).await
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
