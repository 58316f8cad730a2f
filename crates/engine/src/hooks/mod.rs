// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interception of tool, model and collaborator calls.
//!
//! Every guarded action asks [`HookPipeline::before_tool`] or
//! [`HookPipeline::before_model`] first and reports back through the
//! matching `after_*` call. Handlers run in descending priority; the first
//! block wins and later handlers' `before` logic is skipped, but every
//! handler still observes the `after` call, blocked or not.

mod agent;
mod audit;
pub mod mask;
mod model;

pub use agent::{
    HookedGenerator, HookedPlanner, HookedRepairer, GENERATE_TOOL, PLAN_TOOL, REPAIR_TOOL,
};
pub use audit::AuditHookHandler;
pub use model::HookedModel;

use crate::log_stream::JobLogSink;
use mend_core::{HookConfig, HookContext, HookResult};
use std::sync::Arc;

/// Priority of the built-in audit handler; runs before everything else
pub const AUDIT_PRIORITY: i32 = i32::MAX;

/// A participant in the hook chain. Defaults allow and observe nothing.
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Higher runs first
    fn priority(&self) -> i32 {
        0
    }

    fn before_tool(&self, _ctx: &HookContext) -> HookResult {
        HookResult::allow()
    }

    fn after_tool(&self, _ctx: &HookContext, _result: &HookResult) {}

    fn before_model(&self, _ctx: &HookContext) -> HookResult {
        HookResult::allow()
    }

    fn after_model(&self, _ctx: &HookContext, _result: &HookResult) {}
}

/// Ordered handler chain. Clones share handlers.
#[derive(Clone, Default)]
pub struct HookPipeline {
    enabled: bool,
    handlers: Vec<Arc<dyn HookHandler>>,
}

impl HookPipeline {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, handlers: Vec::new() }
    }

    /// A pipeline that allows everything and records nothing
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Pipeline per `config`, with the audit handler writing to `sink` when
    /// auditing is on
    pub fn from_config(config: &HookConfig, sink: Arc<dyn JobLogSink>) -> Self {
        let pipeline = Self::new(config.enabled);
        if config.audit_enabled {
            pipeline.with_handler(Arc::new(AuditHookHandler::new(sink, config.max_payload_chars)))
        } else {
            pipeline
        }
    }

    /// Insert `handler`, keeping descending priority. Equal priorities keep
    /// registration order.
    pub fn with_handler(mut self, handler: Arc<dyn HookHandler>) -> Self {
        let at = self
            .handlers
            .iter()
            .position(|h| h.priority() < handler.priority())
            .unwrap_or(self.handlers.len());
        self.handlers.insert(at, handler);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn before_tool(&self, ctx: &HookContext) -> HookResult {
        self.decide(ctx, "tool", |h, ctx| h.before_tool(ctx))
    }

    pub fn after_tool(&self, ctx: &HookContext, result: &HookResult) {
        if self.enabled {
            self.handlers.iter().for_each(|h| h.after_tool(ctx, result));
        }
    }

    pub fn before_model(&self, ctx: &HookContext) -> HookResult {
        self.decide(ctx, "model", |h, ctx| h.before_model(ctx))
    }

    pub fn after_model(&self, ctx: &HookContext, result: &HookResult) {
        if self.enabled {
            self.handlers.iter().for_each(|h| h.after_model(ctx, result));
        }
    }

    fn decide(
        &self,
        ctx: &HookContext,
        kind: &'static str,
        ask: impl Fn(&dyn HookHandler, &HookContext) -> HookResult,
    ) -> HookResult {
        if !self.enabled {
            return HookResult::allow();
        }
        for handler in &self.handlers {
            let result = ask(handler.as_ref(), ctx);
            if result.is_blocked() {
                tracing::warn!(
                    handler = handler.name(),
                    kind,
                    reason = result.reason(),
                    job_id = ?ctx.job_id,
                    "hook blocked call"
                );
                return result;
            }
        }
        HookResult::allow()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
