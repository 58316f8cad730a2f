// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mend_core::{FakeClock, JobId};

#[test]
fn outcomes_deserialize_with_missing_fields() {
    let plan: PlanOutcome = serde_json::from_str(r#"{"success":true,"contract_text":"c"}"#).unwrap();
    assert!(plan.success);
    assert!(plan.schema_text.is_empty());

    let repair: RepairOutcome = serde_json::from_str(r#"{"success":true}"#).unwrap();
    assert!(!repair.is_usable());
}

#[test]
fn failed_constructors_carry_message() {
    assert_eq!(PlanOutcome::failed("x").error_message.as_deref(), Some("x"));
    assert!(!GenerateOutcome::failed("y").success);
    assert!(!RepairOutcome::failed("z").is_usable());
}

#[test]
fn agent_failure_displays_verbatim() {
    assert_eq!(AgentError::Failed("model timeout".into()).to_string(), "model timeout");
}

#[tokio::test]
async fn fake_repairer_defaults_to_version_bump() {
    let job = Job::new(JobId::new(), "req", 3, &FakeClock::new());
    let repairer = FakeRepairer::new();
    repairer.push_error("boom");

    let err = repairer.fix(&job, &[], &[], "").await.unwrap_err();
    assert_eq!(err.to_string(), "boom");

    let failing = vec![Artifact::new("A.java", "class A {").error("';' expected")];
    let outcome = repairer.fix(&job, &failing, &[], "ctx").await.unwrap();
    assert!(outcome.is_usable());
    assert_eq!(outcome.fixed_artifacts[0].version, 2);
    assert!(!outcome.fixed_artifacts[0].has_errors());
    assert_eq!(repairer.calls()[1].failing_paths, vec!["A.java".to_string()]);
}
