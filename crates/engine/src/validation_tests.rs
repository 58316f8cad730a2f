// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::compliance::SchemaCompliance;
use crate::hooks::HookPipeline;
use crate::test_helpers::RecordingSink;
use mend_adapters::FakeSandbox;
use mend_core::test_support::{code_error, sample_artifacts};
use mend_core::{FakeClock, LogLevel, SandboxConfig};
use tokio_util::sync::CancellationToken;

const USER_PATH: &str = "src/main/java/com/demo/entity/User.java";

fn pipeline(fake: &FakeSandbox, config: ValidationConfig) -> ValidationPipeline<FakeSandbox, FakeClock> {
    let clock = FakeClock::new();
    let sandbox = SandboxService::new(
        fake.clone(),
        SandboxConfig { env_error_max_retries: 1, ..SandboxConfig::default() },
        HookPipeline::disabled(),
        clock.clone(),
        CancellationToken::new(),
    );
    ValidationPipeline::new(Arc::new(sandbox), config, clock)
}

fn failed_build(errors: Vec<ParsedError>) -> BuildResult {
    BuildResult {
        success: false,
        exit_code: 1,
        stdout: "[ERROR] COMPILATION ERROR\n[INFO] BUILD FAILURE".to_string(),
        error_class: ErrorClass::CodeError,
        parsed_errors: errors,
        provider: "fake".to_string(),
        ..BuildResult::default()
    }
}

fn phase<'a>(result: &'a ValidationResult, phase: ValidationPhase) -> &'a PhaseOutcome {
    result.phases.iter().find(|p| p.phase == phase).unwrap()
}

#[tokio::test]
async fn clean_build_passes_every_phase() {
    let fake = FakeSandbox::new();
    let sink = RecordingSink::new();
    let job = Job::builder().build();

    let report = pipeline(&fake, ValidationConfig::default())
        .validate(&job, &sample_artifacts(), &sink)
        .await
        .unwrap();

    let result = &report.result;
    assert!(result.passed);
    assert_eq!(result.failed_phase, None);
    assert_eq!(result.job_id, job.id);
    assert_eq!(result.phases.len(), 3);
    assert!(phase(result, ValidationPhase::Compliance).skipped);
    assert!(!phase(result, ValidationPhase::StaticAnalysis).skipped);
    assert!(result.output.contains("BUILD SUCCESS"));
    assert!(report.artifacts.iter().all(|a| !a.has_errors()));
    assert!(sink.contains("validation passed (round 0)"));
}

#[tokio::test]
async fn compile_failure_blames_the_reported_file() {
    let fake = FakeSandbox::new();
    fake.push_build(
        1,
        format!("[ERROR] /workspace/app/{USER_PATH}:[3,8] cannot find symbol\n[INFO] BUILD FAILURE\n"),
    );

    let report = pipeline(&fake, ValidationConfig::default())
        .validate(&Job::builder().build(), &sample_artifacts(), &RecordingSink::new())
        .await
        .unwrap();

    let result = &report.result;
    assert!(!result.passed);
    assert_eq!(result.failed_phase, Some(ValidationPhase::Compile));
    assert_eq!(result.error_class, ErrorClass::CodeError);
    assert!(result.detail.contains("cannot find symbol"));
    assert!(result.output.contains("[ERROR]"));
    assert_eq!(phase(result, ValidationPhase::StaticAnalysis).detail, "compile failed");
    assert_eq!(phase(result, ValidationPhase::Compile).findings.len(), 1);

    let failing = failing_artifacts(&report.artifacts);
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].path, USER_PATH);
    assert!(failing[0].error.as_deref().unwrap().contains(":3:8: error: cannot find symbol"));
}

#[tokio::test]
async fn static_analysis_runs_after_clean_compile() {
    let fake = FakeSandbox::new();
    let sink = RecordingSink::new();
    let mut artifacts = sample_artifacts();
    artifacts.push(Artifact::new(
        "src/main/java/com/demo/mapper/BadMapper.java",
        "public interface BadMapper {}",
    ));

    let report = pipeline(&fake, ValidationConfig::default())
        .validate(&Job::builder().build(), &artifacts, &sink)
        .await
        .unwrap();

    let result = &report.result;
    assert!(result.compile_passed());
    assert_eq!(result.failed_phase, Some(ValidationPhase::StaticAnalysis));
    assert!(result.detail.contains("[BadMapper.java] missing @Mapper annotation"));
    assert!(failing_artifacts(&report.artifacts).is_empty());
    assert_eq!(sink.count_level(LogLevel::Error), 1);
}

#[tokio::test]
async fn disabled_static_analysis_is_skipped() {
    let fake = FakeSandbox::new();
    let artifacts = vec![Artifact::new("BadMapper.java", "public interface BadMapper {}")];
    let config = ValidationConfig { static_analysis_enabled: false, ..ValidationConfig::default() };

    let report = pipeline(&fake, config)
        .validate(&Job::builder().build(), &artifacts, &RecordingSink::new())
        .await
        .unwrap();

    assert!(report.result.passed);
    assert!(phase(&report.result, ValidationPhase::StaticAnalysis).skipped);
}

#[tokio::test]
async fn compliance_failure_stops_before_static_analysis() {
    let fake = FakeSandbox::new();
    let mut job = Job::builder().build();
    job.lock_contract("contract", "CREATE TABLE orders (id INT);", &FakeClock::new()).unwrap();
    let config = ValidationConfig { compliance_enabled: true, ..ValidationConfig::default() };

    let report = pipeline(&fake, config)
        .with_compliance(Arc::new(SchemaCompliance))
        .validate(&job, &sample_artifacts(), &RecordingSink::new())
        .await
        .unwrap();

    let result = &report.result;
    assert_eq!(result.failed_phase, Some(ValidationPhase::Compliance));
    assert!(result.detail.contains("missing entity for table orders"));
    assert_eq!(phase(result, ValidationPhase::StaticAnalysis).detail, "compliance failed");
}

#[tokio::test]
async fn compliance_needs_flag_and_checker() {
    let fake = FakeSandbox::new();
    let mut job = Job::builder().build();
    job.lock_contract("contract", "CREATE TABLE orders (id INT);", &FakeClock::new()).unwrap();

    let flag_off = pipeline(&fake, ValidationConfig::default())
        .with_compliance(Arc::new(SchemaCompliance))
        .validate(&job, &sample_artifacts(), &RecordingSink::new())
        .await
        .unwrap();
    assert_eq!(phase(&flag_off.result, ValidationPhase::Compliance).detail, "disabled");

    let config = ValidationConfig { compliance_enabled: true, ..ValidationConfig::default() };
    let no_checker = pipeline(&fake, config)
        .validate(&job, &sample_artifacts(), &RecordingSink::new())
        .await
        .unwrap();
    assert!(no_checker.result.passed);
}

#[tokio::test]
async fn parallel_mode_runs_every_phase_but_reports_first_failure() {
    let fake = FakeSandbox::new();
    fake.push_build(1, format!("[ERROR] {USER_PATH}:[1,1] class, interface, or enum expected\n"));
    let mut artifacts = sample_artifacts();
    artifacts.push(Artifact::new("BadMapper.java", "public interface BadMapper {}"));
    let config = ValidationConfig { parallel: true, ..ValidationConfig::default() };

    let report = pipeline(&fake, config)
        .validate(&Job::builder().build(), &artifacts, &RecordingSink::new())
        .await
        .unwrap();

    let result = &report.result;
    assert_eq!(result.failed_phase, Some(ValidationPhase::Compile));
    let analysis = phase(result, ValidationPhase::StaticAnalysis);
    assert!(!analysis.skipped);
    assert!(!analysis.passed);
}

#[tokio::test]
async fn environment_failure_blames_build_descriptor() {
    let fake = FakeSandbox::new();
    fake.push_build(1, "[ERROR] Could not resolve dependencies for project demo:app:jar:1.0\n");

    let report = pipeline(&fake, ValidationConfig::default())
        .validate(&Job::builder().build(), &sample_artifacts(), &RecordingSink::new())
        .await
        .unwrap();

    assert_eq!(report.result.error_class, ErrorClass::EnvironmentError);
    assert!(report.result.detail.starts_with("environment error: dependency resolution failed"));
    let failing = failing_artifacts(&report.artifacts);
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].path, "pom.xml");
    assert!(failing[0].error.as_deref().unwrap().contains("Could not resolve dependencies"));
}

#[test]
fn errors_match_by_file_name_when_paths_differ() {
    let build = failed_build(vec![code_error("/elsewhere/User.java", 4, "';' expected")]);
    let marked = mark_artifact_errors(&sample_artifacts(), &build);
    let failing = failing_artifacts(&marked);
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].path, USER_PATH);
}

#[test]
fn path_suffix_match_wins_over_file_name() {
    let mut artifacts = sample_artifacts();
    artifacts.push(Artifact::new("src/main/java/com/demo/dto/User.java", "class User {}"));
    let build = failed_build(vec![code_error(&format!("/app/{USER_PATH}"), 2, "bad")]);

    let failing = failing_artifacts(&mark_artifact_errors(&artifacts, &build));
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].path, USER_PATH);
}

#[test]
fn unmatched_errors_fall_back_to_pom() {
    let build = failed_build(vec![code_error("Generated.java", 1, "oops")]);
    let failing = failing_artifacts(&mark_artifact_errors(&sample_artifacts(), &build));
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].path, "pom.xml");
    assert!(failing[0].error.as_deref().unwrap().contains("BUILD FAILURE"));
}

#[test]
fn nothing_is_blamed_without_a_pom() {
    let artifacts = vec![Artifact::new("App.java", "class App {}")];
    let build = failed_build(vec![code_error("Other.java", 1, "oops")]);
    assert!(failing_artifacts(&mark_artifact_errors(&artifacts, &build)).is_empty());
}

#[test]
fn success_clears_previous_errors() {
    let artifacts = vec![Artifact::new("App.java", "class App {}").error("old failure")];
    let build = BuildResult { success: true, ..BuildResult::default() };
    assert!(failing_artifacts(&mark_artifact_errors(&artifacts, &build)).is_empty());
}
