// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::mask::sanitize;
use super::{HookHandler, AUDIT_PRIORITY};
use crate::log_stream::JobLogSink;
use mend_core::{HookContext, HookResult, LogEntry, LogLevel, LogRole};
use std::fmt::Display;
use std::sync::Arc;

/// Writes a masked, truncated line for every hook event.
///
/// Never blocks. Entries go to `tracing` always and to the job log when
/// the context names a job.
pub struct AuditHookHandler {
    sink: Arc<dyn JobLogSink>,
    max_payload_chars: usize,
}

impl AuditHookHandler {
    pub fn new(sink: Arc<dyn JobLogSink>, max_payload_chars: usize) -> Self {
        Self { sink, max_payload_chars }
    }

    fn emit(&self, ctx: &HookContext, message: String, level: LogLevel) {
        let sanitized = sanitize(&message, self.max_payload_chars);
        tracing::info!(job_id = ?ctx.job_id, "hook audit: {sanitized}");
        if let Some(job_id) = ctx.job_id {
            self.sink.emit(&job_id, LogEntry::new(LogRole::System, level, sanitized));
        }
    }
}

fn show<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn after_level(result: &HookResult) -> LogLevel {
    if result.is_blocked() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    }
}

impl HookHandler for AuditHookHandler {
    fn name(&self) -> &str {
        "audit"
    }

    fn priority(&self) -> i32 {
        AUDIT_PRIORITY
    }

    fn before_tool(&self, ctx: &HookContext) -> HookResult {
        let message = format!(
            "tool start: tool={}, input={}",
            show(ctx.tool_name.as_deref()),
            show(ctx.tool_input.as_deref())
        );
        self.emit(ctx, message, LogLevel::Info);
        HookResult::allow()
    }

    fn after_tool(&self, ctx: &HookContext, result: &HookResult) {
        let message = format!(
            "tool end: tool={}, success={}, exit_code={}, duration_ms={}, decision={}, reason={}",
            show(ctx.tool_name.as_deref()),
            show(ctx.success),
            show(ctx.exit_code),
            show(ctx.duration_ms),
            result.decision,
            show(result.reason.as_deref().or(ctx.error_message.as_deref())),
        );
        self.emit(ctx, message, after_level(result));
    }

    fn before_model(&self, ctx: &HookContext) -> HookResult {
        let message = format!(
            "model start: provider={}, model={}, prompt={}",
            show(ctx.metadata.get("provider")),
            show(ctx.model_name.as_deref()),
            show(ctx.prompt_preview.as_deref())
        );
        self.emit(ctx, message, LogLevel::Info);
        HookResult::allow()
    }

    fn after_model(&self, ctx: &HookContext, result: &HookResult) {
        let message = format!(
            "model end: provider={}, model={}, success={}, tokens={}, duration_ms={}, decision={}, reason={}",
            show(ctx.metadata.get("provider")),
            show(ctx.model_name.as_deref()),
            show(ctx.success),
            show(ctx.total_tokens),
            show(ctx.duration_ms),
            result.decision,
            show(result.reason.as_deref().or(ctx.error_message.as_deref())),
        );
        self.emit(ctx, message, after_level(result));
    }
}
