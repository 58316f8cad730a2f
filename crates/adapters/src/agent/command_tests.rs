// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mend_core::{FakeClock, TaskType};

fn agent(script: &str) -> CommandAgent {
    CommandAgent::new(script, Duration::from_secs(10))
}

fn job() -> Job {
    let clock = FakeClock::new();
    let mut job = Job::new(JobId::new(), "user service", 3, &clock);
    job.lock_contract("contract", "CREATE TABLE users (id BIGINT);", &clock).unwrap();
    job
}

#[tokio::test]
async fn planner_reads_outcome_and_sees_stage() {
    let planner = CommandPlanner(agent(
        r#"cat >/dev/null; printf '{"success":true,"contract_text":"%s","schema_text":"S"}' "$MEND_STAGE""#,
    ));
    let outcome = planner.design(&job()).await.unwrap();
    assert_eq!(outcome, PlanOutcome::ok("plan", "S"));
}

#[tokio::test]
async fn generator_receives_contract_and_tasks_on_stdin() {
    let generator = CommandGenerator::new(
        agent(
            r#"input=$(cat); case "$input" in *'"schema_text":"CREATE TABLE users'*'"id":"entity_users"'*)
                echo 'progress...'; echo '{"success":true,"artifacts":[{"path":"User.java","content":"class User {}"}]}' ;;
              *) echo "bad request: $input" >&2; exit 3 ;;
            esac"#,
        ),
        "backend",
    );
    let plan = vec![TaskNode::for_table(TaskType::Entity, "users")];

    let outcome = generator.generate(&job(), 0, &plan).await.unwrap();

    assert_eq!(generator.target_type(), "backend");
    assert!(outcome.success);
    assert_eq!(outcome.artifacts, vec![Artifact::new("User.java", "class User {}")]);
}

#[tokio::test]
async fn repairer_failure_outcome_round_trips() {
    let repairer = CommandRepairer(agent(
        r#"cat >/dev/null; echo '{"success":false,"error_message":"model refused"}'"#,
    ));
    let outcome = repairer.fix(&job(), &[], &[], "").await.unwrap();
    assert!(!outcome.is_usable());
    assert_eq!(outcome.error_message.as_deref(), Some("model refused"));
}

#[tokio::test]
async fn nonzero_exit_is_agent_failure_with_stderr() {
    let planner = CommandPlanner(agent("cat >/dev/null; echo 'quota exceeded' >&2; exit 7"));
    let err = planner.design(&job()).await.unwrap_err();
    assert_eq!(err.to_string(), "plan agent exited with 7: quota exceeded");
}

#[tokio::test]
async fn unparseable_output_is_reported() {
    let planner = CommandPlanner(agent("cat >/dev/null; echo not json"));
    let err = planner.design(&job()).await.unwrap_err();
    assert!(matches!(err, AgentError::Output { stage: "plan", .. }), "{err}");
}

#[tokio::test]
async fn timeout_is_agent_failure() {
    let planner =
        CommandPlanner(CommandAgent::new("sleep 5", Duration::from_millis(200)));
    let err = planner.design(&job()).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[test]
fn tail_keeps_last_lines() {
    assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
    assert_eq!(tail("", 2), "");
}
