// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tool_context_carries_job_identity() {
    let job = Job::builder().tenant_id(Some("t1".into())).user_id(Some("u1".into())).build();
    let ctx = HookContext::tool(HookEvent::BeforeTool, "shell", "ls -la").for_job(&job);

    assert_eq!(ctx.event, Some(HookEvent::BeforeTool));
    assert_eq!(ctx.job_id, Some(job.id));
    assert_eq!(ctx.tenant_id.as_deref(), Some("t1"));
    assert_eq!(ctx.user_id.as_deref(), Some("u1"));
    assert_eq!(ctx.tool_input.as_deref(), Some("ls -la"));
}

#[test]
fn after_context_reuses_before_fields() {
    let before = HookContext::model(HookEvent::BeforeModel, "gpt", "hello").metadata("provider", "fake");
    let after = before.clone().with_event(HookEvent::AfterModel).success(true).duration_ms(12u64);

    assert_eq!(after.event, Some(HookEvent::AfterModel));
    assert_eq!(after.model_name, before.model_name);
    assert_eq!(after.metadata.get("provider").map(String::as_str), Some("fake"));
    assert_eq!(after.success, Some(true));
    assert_eq!(after.duration_ms, Some(12));
}

#[test]
fn hook_result_block_has_reason() {
    let blocked = HookResult::block("denied by policy");
    assert!(blocked.is_blocked());
    assert_eq!(blocked.reason(), "denied by policy");

    let allowed = HookResult::allow();
    assert!(!allowed.is_blocked());
    assert_eq!(allowed.reason(), "");
}
