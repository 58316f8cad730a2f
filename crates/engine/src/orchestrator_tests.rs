// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hooks::HookPipeline;
use crate::sandbox::SandboxService;
use mend_adapters::{
    FakeGenerator, FakePlanner, FakeRepairer, FakeSandbox, GenerateOutcome, PlanOutcome,
};
use mend_core::test_support::sample_artifacts;
use mend_core::{FakeClock, LogLevel, SandboxConfig, ValidationConfig};
use mend_storage::MemoryJobStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SCHEMA: &str = "CREATE TABLE users (id BIGINT PRIMARY KEY);\n\
CREATE TABLE orders (id BIGINT, user_id BIGINT REFERENCES users(id));";
const USER_PATH: &str = "src/main/java/com/demo/entity/User.java";

fn code_failure() -> String {
    format!("[ERROR] /workspace/app/{USER_PATH}:[1,20] cannot find symbol\n[INFO] BUILD FAILURE\n")
}

const ENV_FAILURE: &str = "[ERROR] Could not resolve dependencies for project demo:app:jar:1.0\n";

type TestOrchestrator = Orchestrator<FakeSandbox, MemoryJobStore, FakeClock>;

struct Harness {
    orchestrator: TestOrchestrator,
    store: MemoryJobStore,
    sandbox: FakeSandbox,
    planner: FakePlanner,
    generator: FakeGenerator,
    repairer: FakeRepairer,
}

impl Harness {
    fn new() -> Self {
        Self::build(
            FakePlanner::with_schema(SCHEMA),
            FakeGenerator::new("backend", sample_artifacts()),
            OrchestratorConfig::default(),
        )
    }

    fn build(planner: FakePlanner, generator: FakeGenerator, config: OrchestratorConfig) -> Self {
        let clock = FakeClock::new();
        let store = MemoryJobStore::new();
        let sandbox = FakeSandbox::new();
        let repairer = FakeRepairer::new();
        let service = SandboxService::new(
            sandbox.clone(),
            SandboxConfig {
                env_error_max_retries: 1,
                env_error_retry_delay_ms: 0,
                ..SandboxConfig::default()
            },
            HookPipeline::disabled(),
            clock.clone(),
            CancellationToken::new(),
        );
        let deps = OrchestratorDeps {
            store: store.clone(),
            logs: LogHub::new(store.clone()),
            planner: Arc::new(planner.clone()),
            generator: Arc::new(generator.clone()),
            repairer: Arc::new(repairer.clone()),
            validation: ValidationPipeline::new(
                Arc::new(service),
                ValidationConfig::default(),
                clock.clone(),
            ),
            memory: SessionMemoryStore::new(
                Duration::from_secs(3600),
                config.repeated_error_tolerance,
                clock.clone(),
            ),
        };
        let orchestrator = Orchestrator::new(deps, config, CyclePolicy::Fallback, clock);
        Self { orchestrator, store, sandbox, planner, generator, repairer }
    }

    async fn run(&self) -> Job {
        let job = self.orchestrator.create_job("build a todo service").unwrap();
        self.orchestrator.run(job.id).await.unwrap()
    }

    fn messages(&self, job: &Job) -> Vec<String> {
        self.store.logs(&job.id).unwrap().into_iter().map(|e| e.message).collect()
    }
}

fn index_of(messages: &[String], needle: &str) -> usize {
    messages
        .iter()
        .position(|m| m.contains(needle))
        .unwrap_or_else(|| panic!("no log containing {needle:?} in {messages:#?}"))
}

#[tokio::test]
async fn clean_build_completes_in_one_round() {
    let h = Harness::new();
    let job = h.run().await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.current_round, 0);
    assert!(job.last_error.is_none());
    assert!(job.is_contract_locked());
    assert_eq!(job.sandbox.as_ref().unwrap().session_id, "fake-1");
    assert_eq!(h.orchestrator.validations(&job.id).unwrap().len(), 1);
    assert_eq!(h.orchestrator.get_artifacts(&job.id).unwrap().len(), 3);
    assert_eq!(h.planner.calls(), vec![job.id]);
    assert!(h.repairer.calls().is_empty());
    assert_eq!(h.sandbox.destroyed(), vec!["fake-1".to_string()]);
}

#[tokio::test]
async fn generation_follows_dependency_order() {
    let h = Harness::new();
    h.run().await;

    let plans = h.generator.plans();
    assert_eq!(plans.len(), 1);
    let plan = &plans[0];
    assert_eq!(plan.len(), 8);
    let at = |id: &str| plan.iter().position(|p| p == id).unwrap();
    assert!(at("entity_users") < at("entity_orders"));
    assert!(at("entity_orders") < at("mapper_orders"));
}

#[tokio::test]
async fn transitions_are_logged_in_order() {
    let h = Harness::new();
    let job = h.run().await;

    let messages = h.messages(&job);
    let steps = [
        "job queued",
        "designing contract",
        "contract locked",
        "generating code",
        "validating build",
        "validation passed (round 0)",
        "job completed",
    ];
    let positions: Vec<usize> = steps.iter().map(|s| index_of(&messages, s)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{messages:#?}");
}

#[tokio::test]
async fn failed_build_is_repaired_then_completes() {
    let h = Harness::new();
    h.sandbox.push_build(1, code_failure());

    let job = h.run().await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.current_round, 1);
    let calls = h.repairer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].round, 0);
    assert_eq!(calls[0].failing_paths, vec![USER_PATH.to_string()]);
    assert_eq!(calls[0].history_len, 1);
    assert!(calls[0].context.contains("first repair"));

    let artifacts = h.orchestrator.get_artifacts(&job.id).unwrap();
    assert_eq!(artifacts.len(), 3);
    let user = artifacts.iter().find(|a| a.path == USER_PATH).unwrap();
    assert_eq!(user.version, 2);
    assert_eq!(user.agent, "repair");
}

#[tokio::test]
async fn repaired_artifacts_get_next_version_and_round() {
    let h = Harness::new();
    h.sandbox.push_build(1, code_failure());
    h.repairer.push(RepairOutcome::ok(vec![Artifact::new(USER_PATH, "class User { Long id; }")]));

    let job = h.run().await;

    assert_eq!(job.state, JobState::Completed);
    let artifacts = h.orchestrator.get_artifacts(&job.id).unwrap();
    let user = artifacts.iter().find(|a| a.path == USER_PATH).unwrap();
    assert_eq!(user.version, 2);
    assert_eq!(user.round, 1);
    assert_eq!(user.agent, REPAIR_AGENT);
    assert_eq!(user.content, "class User { Long id; }");
    assert!(user.error.is_none());
}

#[tokio::test]
async fn round_budget_allows_two_repairs_for_three_rounds() {
    let h = Harness::new();
    for _ in 0..3 {
        h.sandbox.push_build(1, code_failure());
    }

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.current_round, 2);
    let rounds: Vec<u32> = h.repairer.calls().iter().map(|c| c.round).collect();
    assert_eq!(rounds, vec![0, 1]);
    assert_eq!(h.orchestrator.validations(&job.id).unwrap().len(), 3);
    let error = job.last_error.clone().unwrap();
    assert!(error.contains("3 validations, 2 repairs"), "{error}");
    assert!(error.contains("exhausted after 2 repair rounds"), "{error}");
    assert_eq!(h.sandbox.destroyed(), vec!["fake-1".to_string()]);
}

#[tokio::test]
async fn repair_receives_growing_history_and_context() {
    let h = Harness::new();
    for _ in 0..3 {
        h.sandbox.push_build(1, code_failure());
    }
    h.run().await;

    let calls = h.repairer.calls();
    assert_eq!(calls[1].history_len, 2);
    assert!(calls[1].context.contains("### Repair history"));
    assert!(calls[1].context.contains("round 0: repaired [User.java]"));
}

#[tokio::test]
async fn environment_errors_skip_repair() {
    let h = Harness::new();
    for _ in 0..3 {
        h.sandbox.push_build(1, ENV_FAILURE);
    }

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.current_round, 2);
    assert!(h.repairer.calls().is_empty());
    let error = job.last_error.clone().unwrap();
    assert!(error.contains("environment errors detected, no repair triggered"), "{error}");
    assert!(h.messages(&job).iter().any(|m| m.contains("skipping repair")));
}

#[tokio::test]
async fn environment_error_then_clean_build_completes() {
    let h = Harness::new();
    h.sandbox.push_build(1, ENV_FAILURE);

    let job = h.run().await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.current_round, 1);
    assert!(h.repairer.calls().is_empty());
}

#[tokio::test]
async fn unlocalized_failure_stops_the_loop() {
    let generator = FakeGenerator::new(
        "backend",
        vec![Artifact::new("src/main/java/com/demo/App.java", "class App {}")],
    );
    let h =
        Harness::build(FakePlanner::with_schema(SCHEMA), generator, OrchestratorConfig::default());
    h.sandbox.push_build(
        1,
        "[ERROR] /app/src/Other.java:[3,1] cannot find symbol\n[INFO] BUILD FAILURE\n",
    );

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.as_deref(), Some("cannot localize failing files"));
    assert!(h.repairer.calls().is_empty());
}

#[tokio::test]
async fn planner_error_fails_job_verbatim() {
    let h = Harness::build(
        FakePlanner::erroring("planner crashed: quota exceeded"),
        FakeGenerator::new("backend", sample_artifacts()),
        OrchestratorConfig::default(),
    );

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.as_deref(), Some("planner crashed: quota exceeded"));
    assert!(!job.is_contract_locked());
    assert_eq!(h.sandbox.created_count(), 0);
    assert!(h.generator.plans().is_empty());
}

#[tokio::test]
async fn unsuccessful_plan_keeps_its_message() {
    let h = Harness::build(
        FakePlanner::new(PlanOutcome::failed("requirement too vague")),
        FakeGenerator::new("backend", sample_artifacts()),
        OrchestratorConfig::default(),
    );

    let job = h.run().await;
    assert_eq!(job.last_error.as_deref(), Some("requirement too vague"));
}

#[tokio::test]
async fn generation_failures_fail_the_job() {
    let failed = Harness::build(
        FakePlanner::with_schema(SCHEMA),
        FakeGenerator::with_outcome("backend", GenerateOutcome::failed("no template for target")),
        OrchestratorConfig::default(),
    );
    let job = failed.run().await;
    assert_eq!(job.last_error.as_deref(), Some("no template for target"));

    let empty = Harness::build(
        FakePlanner::with_schema(SCHEMA),
        FakeGenerator::new("backend", Vec::new()),
        OrchestratorConfig::default(),
    );
    let job = empty.run().await;
    assert_eq!(job.last_error.as_deref(), Some("code generation produced no artifacts"));
}

#[tokio::test]
async fn unusable_repair_fails_the_job() {
    let h = Harness::new();
    h.sandbox.push_build(1, code_failure());
    h.repairer.push(RepairOutcome::failed("model refused"));

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.as_deref(), Some("model refused"));
    assert_eq!(job.current_round, 0);
}

#[tokio::test]
async fn repairer_error_fails_job_and_tears_down() {
    let h = Harness::new();
    h.sandbox.push_build(1, code_failure());
    h.repairer.push_error("repair service unavailable");

    let job = h.run().await;

    assert_eq!(job.last_error.as_deref(), Some("repair service unavailable"));
    assert_eq!(h.sandbox.destroyed(), vec!["fake-1".to_string()]);
}

#[tokio::test]
async fn repeated_signature_stops_repair_early() {
    let config = OrchestratorConfig {
        max_rounds: 5,
        stop_on_repeated_error: true,
        repeated_error_tolerance: 2,
        ..OrchestratorConfig::default()
    };
    let h = Harness::build(
        FakePlanner::with_schema(SCHEMA),
        FakeGenerator::new("backend", sample_artifacts()),
        config,
    );
    for _ in 0..5 {
        h.sandbox.push_build(1, code_failure());
    }

    let job = h.run().await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(h.repairer.calls().len(), 1);
    let error = job.last_error.clone().unwrap();
    assert!(error.starts_with("same error repeated 2 times"), "{error}");
}

#[tokio::test]
async fn finished_job_log_replays_history_then_ends() {
    let h = Harness::new();
    let job = h.run().await;

    let mut subscription = h.orchestrator.subscribe_logs(&job.id).unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = subscription.next().await {
        seen.push(entry);
    }

    assert_eq!(seen.first().unwrap().message, "job queued");
    assert_eq!(seen.last().unwrap().message, "job completed");
    assert_eq!(seen.last().unwrap().level, LogLevel::Success);
}

#[tokio::test]
async fn submit_runs_in_background() {
    let h = Harness::new();
    let job_id = h.orchestrator.submit("build a todo service").unwrap();

    let mut state = JobState::Queued;
    for _ in 0..200 {
        state = h.orchestrator.get_job(&job_id).unwrap().unwrap().state;
        if state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(state, JobState::Completed);
}

#[tokio::test]
async fn run_rejects_unknown_and_skips_finished_jobs() {
    let h = Harness::new();
    let missing = JobId::new();
    assert!(matches!(
        h.orchestrator.run(missing).await,
        Err(OrchestratorError::NotFound(id)) if id == missing
    ));

    let job = h.run().await;
    let again = h.orchestrator.run(job.id).await.unwrap();
    assert_eq!(again.state, JobState::Completed);
    assert_eq!(h.planner.calls().len(), 1);
}
