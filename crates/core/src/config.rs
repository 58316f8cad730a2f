// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline configuration, loadable from TOML.
//!
//! Every field has a default so a partial (or empty) file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    pub sandbox: SandboxConfig,
    pub validation: ValidationConfig,
    pub hooks: HookConfig,
    pub toolset: ToolsetConfig,
    pub scheduler: SchedulerConfig,
    pub memory: MemoryConfig,
    pub agents: AgentsConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_rounds: u32,
    /// Stop repairing when the same error signature keeps coming back
    pub stop_on_repeated_error: bool,
    pub repeated_error_tolerance: u32,
    /// Generator target type used for the coding phase
    pub target_type: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            stop_on_repeated_error: false,
            repeated_error_tolerance: 2,
            target_type: "backend".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxProviderKind {
    #[default]
    Remote,
    Local,
    Command,
}

crate::simple_display! {
    SandboxProviderKind {
        Remote => "remote",
        Local => "local",
        Command => "command",
    }
}

impl std::str::FromStr for SandboxProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "command" | "external" => Ok(Self::Command),
            other => Err(ConfigError::InvalidValue {
                key: "sandbox.provider".into(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub provider: SandboxProviderKind,
    /// Local execution writes to the host filesystem, so it is opt-in
    pub allow_local_fallback: bool,
    pub env_error_max_retries: u32,
    pub env_error_retry_delay_ms: u64,
    pub compile_timeout_seconds: u64,
    pub build_command: String,
    pub remote_base_url: String,
    pub remote_template: String,
    pub remote_workdir: String,
    pub remote_request_timeout_seconds: u64,
    pub session_ttl_seconds: u64,
    pub local_root: PathBuf,
    pub local_retention_seconds: u64,
    /// Shell command for the pluggable provider; receives a verb and args
    pub external_command: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            provider: SandboxProviderKind::Remote,
            allow_local_fallback: false,
            env_error_max_retries: 3,
            env_error_retry_delay_ms: 2000,
            compile_timeout_seconds: 300,
            build_command: "mvn compile -e -B --no-transfer-progress".to_string(),
            remote_base_url: "http://127.0.0.1:3000".to_string(),
            remote_template: "maven-jdk17".to_string(),
            remote_workdir: "/home/user/app".to_string(),
            remote_request_timeout_seconds: 60,
            session_ttl_seconds: 2 * 60 * 60,
            local_root: std::env::temp_dir().join("mend-sandbox"),
            local_retention_seconds: 24 * 60 * 60,
            external_command: String::new(),
        }
    }
}

impl SandboxConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.env_error_retry_delay_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn local_retention(&self) -> Duration {
        Duration::from_secs(self.local_retention_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub compliance_enabled: bool,
    pub static_analysis_enabled: bool,
    /// Dispatch phases concurrently; overall status still reflects phase order
    pub parallel: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { compliance_enabled: false, static_analysis_enabled: true, parallel: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub enabled: bool,
    pub audit_enabled: bool,
    pub max_payload_chars: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self { enabled: true, audit_enabled: true, max_payload_chars: 2000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsetConfig {
    pub enabled: bool,
    /// Defaults to the process working directory when unset
    pub workspace_root: Option<PathBuf>,
    pub allow_commands: Vec<String>,
    pub deny_commands: Vec<String>,
    /// Empty means any extension
    pub allow_file_extensions: Vec<String>,
    pub exclude_path_contains: Vec<String>,
    pub max_file_size_bytes: u64,
    pub max_search_file_size_bytes: u64,
    pub max_search_files: usize,
    pub max_batch_files: usize,
    pub max_output_lines: usize,
    pub max_output_chars: usize,
    pub default_timeout_seconds: u64,
}

impl Default for ToolsetConfig {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            enabled: true,
            workspace_root: None,
            allow_commands: strings(&[
                "ls", "cat", "pwd", "find", "grep", "rg", "head", "tail", "wc", "mvn", "java",
                "javac", "echo",
            ]),
            deny_commands: strings(&[
                "rm", "sudo", "curl", "wget", "ssh", "scp", "dd", "mkfs", "shutdown", "reboot",
            ]),
            allow_file_extensions: strings(&[
                ".java", ".xml", ".yml", ".yaml", ".properties", ".md", ".sql", ".ts", ".tsx",
                ".js", ".json", ".txt",
            ]),
            exclude_path_contains: strings(&["/target/", "/node_modules/", "/.git/"]),
            max_file_size_bytes: 512 * 1024,
            max_search_file_size_bytes: 256 * 1024,
            max_search_files: 5000,
            max_batch_files: 20,
            max_output_lines: 200,
            max_output_chars: 20_000,
            default_timeout_seconds: 15,
        }
    }
}

/// Behaviour when the task graph cannot be fully ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Stable sort by priority key and continue
    #[default]
    Fallback,
    /// Surface the cycle as an error
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_policy: CyclePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub ttl_hours: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

impl MemoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 60 * 60)
    }
}

/// Shell commands backing the planning, generation and repair collaborators.
///
/// Empty commands leave the collaborator unconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub planner_command: String,
    pub generator_command: String,
    pub repairer_command: String,
    pub timeout_seconds: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            planner_command: String::new(),
            generator_command: String::new(),
            repairer_command: String::new(),
            timeout_seconds: 600,
        }
    }
}

impl AgentsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
