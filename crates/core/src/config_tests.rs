// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use yare::parameterized;

#[test]
fn empty_document_yields_defaults() {
    let config = PipelineConfig::from_toml_str("").unwrap();
    assert_eq!(config, PipelineConfig::default());
    assert_eq!(config.orchestrator.max_rounds, 3);
    assert_eq!(config.sandbox.provider, SandboxProviderKind::Remote);
    assert!(!config.sandbox.allow_local_fallback);
    assert_eq!(config.sandbox.env_error_max_retries, 3);
    assert_eq!(config.sandbox.compile_timeout(), Duration::from_secs(300));
    assert_eq!(config.scheduler.cycle_policy, CyclePolicy::Fallback);
}

#[test]
fn partial_sections_override_only_named_fields() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [orchestrator]
        max_rounds = 5

        [sandbox]
        provider = "local"
        allow_local_fallback = true
        env_error_retry_delay_ms = 10

        [toolset]
        allow_commands = ["ls"]
        "#,
    )
    .unwrap();

    assert_eq!(config.orchestrator.max_rounds, 5);
    assert_eq!(config.orchestrator.target_type, "backend");
    assert_eq!(config.sandbox.provider, SandboxProviderKind::Local);
    assert!(config.sandbox.allow_local_fallback);
    assert_eq!(config.sandbox.retry_delay(), Duration::from_millis(10));
    assert_eq!(config.sandbox.env_error_max_retries, 3);
    assert_eq!(config.toolset.allow_commands, vec!["ls".to_string()]);
    assert!(!config.toolset.deny_commands.is_empty());
}

#[test]
fn unknown_provider_is_a_parse_error() {
    let err = PipelineConfig::from_toml_str("[sandbox]\nprovider = \"ftp\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[parameterized(
    remote = { "remote", SandboxProviderKind::Remote },
    local_upper = { "LOCAL", SandboxProviderKind::Local },
    command = { "command", SandboxProviderKind::Command },
    external_alias = { "external", SandboxProviderKind::Command },
)]
fn provider_from_str(input: &str, expected: SandboxProviderKind) {
    assert_eq!(input.parse::<SandboxProviderKind>().unwrap(), expected);
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[memory]\nttl_hours = 2").unwrap();
    let config = PipelineConfig::load(file.path()).unwrap();
    assert_eq!(config.memory.ttl(), Duration::from_secs(7200));
}

#[test]
fn load_missing_file_reports_path() {
    let err = PipelineConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.toml"));
}

#[test]
fn agent_commands_default_to_unconfigured() {
    let config = PipelineConfig::from_toml_str("[agents]\nplanner_command = \"./plan.sh\"").unwrap();
    assert_eq!(config.agents.planner_command, "./plan.sh");
    assert!(config.agents.repairer_command.is_empty());
    assert_eq!(config.agents.timeout(), Duration::from_secs(600));
}
