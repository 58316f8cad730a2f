// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interception context and decisions for tool and model calls.

use crate::job::{Job, JobId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    BeforeTool,
    AfterTool,
    BeforeModel,
    AfterModel,
}

crate::simple_display! {
    HookEvent {
        BeforeTool => "before_tool",
        AfterTool => "after_tool",
        BeforeModel => "before_model",
        AfterModel => "after_model",
    }
}

/// One intercepted action: who, what, and (after execution) how it went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookContext {
    pub event: Option<HookEvent>,
    pub job_id: Option<JobId>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub model_name: Option<String>,
    pub prompt_preview: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub duration_ms: Option<u64>,
    pub exit_code: Option<i32>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl HookContext {
    pub fn tool(event: HookEvent, tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            event: Some(event),
            tool_name: Some(tool.into()),
            tool_input: Some(input.into()),
            ..Default::default()
        }
    }

    pub fn model(event: HookEvent, model: impl Into<String>, prompt_preview: impl Into<String>) -> Self {
        Self {
            event: Some(event),
            model_name: Some(model.into()),
            prompt_preview: Some(prompt_preview.into()),
            ..Default::default()
        }
    }

    /// Copy actor identity from the job
    pub fn for_job(mut self, job: &Job) -> Self {
        self.job_id = Some(job.id);
        self.tenant_id = job.tenant_id.clone();
        self.user_id = job.user_id.clone();
        self
    }

    /// Same action, re-tagged as a different event
    pub fn with_event(mut self, event: HookEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    crate::setters! {
        option {
            job_id: JobId,
            tenant_id: String,
            user_id: String,
            model_name: String,
            prompt_tokens: u32,
            completion_tokens: u32,
            total_tokens: u32,
            duration_ms: u64,
            exit_code: i32,
            success: bool,
            error_message: String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookDecision {
    Allow,
    Block,
}

crate::simple_display! {
    HookDecision {
        Allow => "allow",
        Block => "block",
    }
}

/// Verdict of a `before` hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookResult {
    pub decision: HookDecision,
    pub reason: Option<String>,
}

impl HookResult {
    pub fn allow() -> Self {
        Self { decision: HookDecision::Allow, reason: None }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self { decision: HookDecision::Block, reason: Some(reason.into()) }
    }

    pub fn is_blocked(&self) -> bool {
        self.decision == HookDecision::Block
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
