// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mend_adapters::{FakeGenerator, FakePlanner, FakeRepairer, FakeSandbox};
use mend_core::test_support::sample_artifacts;
use serial_test::serial;
use std::sync::Arc;

fn daemon(dir: &Path) -> (Daemon<FakeSandbox>, FakeSandbox) {
    let sandbox = FakeSandbox::new();
    let mut pipeline = PipelineConfig::default();
    pipeline.sandbox.local_root = dir.join("local");
    let collaborators = Collaborators {
        planner: Arc::new(FakePlanner::with_schema("CREATE TABLE users (id BIGINT);")),
        generator: Arc::new(FakeGenerator::new("backend", sample_artifacts())),
        repairer: Arc::new(FakeRepairer::new()),
    };
    let daemon =
        startup_with(&Config::at(dir.join("state")), pipeline, sandbox.clone(), collaborators)
            .unwrap();
    (daemon, sandbox)
}

#[test]
fn config_layout_under_state_dir() {
    let config = Config::at("/var/lib/mend");
    assert_eq!(config.snapshot_path, PathBuf::from("/var/lib/mend/jobs.json"));
    assert!(config.config_path.is_none());
    assert!(config.log_dir.is_none());
}

#[test]
#[serial]
fn pipeline_config_reads_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mend.toml");
    std::fs::write(
        &path,
        "[orchestrator]\nmax_rounds = 4\n\n[sandbox]\nprovider = \"local\"\n\n[scheduler]\ncycle_policy = \"reject\"\n",
    )
    .unwrap();

    let config = load_pipeline_config(Some(&path)).unwrap();

    assert_eq!(config.orchestrator.max_rounds, 4);
    assert_eq!(config.sandbox.provider, mend_core::SandboxProviderKind::Local);
    assert_eq!(config.scheduler.cycle_policy, mend_core::CyclePolicy::Reject);
}

#[test]
#[serial]
fn pipeline_config_defaults_without_file() {
    assert_eq!(load_pipeline_config(None).unwrap(), PipelineConfig::default());
}

#[test]
#[serial]
fn missing_config_file_is_an_error() {
    let err = load_pipeline_config(Some(Path::new("/nonexistent/mend.toml"))).unwrap_err();
    assert!(matches!(err, LifecycleError::Config(ConfigError::Read { .. })), "{err}");
}

#[tokio::test]
async fn run_requirement_completes_and_persists_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, sandbox) = daemon(dir.path());

    let job = daemon.run_requirement("  build a user service  ").await.unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.requirement, "build a user service");
    assert_eq!(sandbox.exec_count(), 1);

    let restored = MemoryJobStore::load_snapshot(&daemon.config.snapshot_path).unwrap();
    let saved = restored.get_job(&job.id).unwrap().unwrap();
    assert_eq!(saved.state, JobState::Completed);
    assert!(!restored.logs(&job.id).unwrap().is_empty());
}

#[tokio::test]
async fn summary_lists_latest_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, _) = daemon(dir.path());
    let job = daemon.run_requirement("build a user service").await.unwrap();

    let summary = daemon.summary(&job).unwrap();

    assert_eq!(summary.job_id, job.id.to_string());
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.rounds, 0);
    assert!(summary.error.is_none());
    assert_eq!(summary.artifacts.len(), sample_artifacts().len());
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["state"], "completed");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn blank_requirement_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, sandbox) = daemon(dir.path());

    let err = daemon.run_requirement("   ").await.unwrap_err();

    assert!(matches!(err, LifecycleError::EmptyRequirement));
    assert!(daemon.store().list_jobs().unwrap().is_empty());
    assert_eq!(sandbox.created_count(), 0);
}

#[tokio::test]
async fn shutdown_cancels_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, _) = daemon(dir.path());
    let token = daemon.shutdown_token();

    daemon.shutdown();

    assert!(token.is_cancelled());
    assert!(daemon.config.snapshot_path.exists());
}
