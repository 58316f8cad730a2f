// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use mend_core::{ConfigError, PipelineConfig, SandboxProviderKind};

use crate::lifecycle::LifecycleError;

pub const CONFIG: &str = "MEND_CONFIG";
pub const MAX_ROUNDS: &str = "MEND_MAX_ROUNDS";
pub const SANDBOX_PROVIDER: &str = "MEND_SANDBOX_PROVIDER";
pub const ALLOW_LOCAL_FALLBACK: &str = "MEND_ALLOW_LOCAL_FALLBACK";
pub const REMOTE_URL: &str = "MEND_REMOTE_URL";
pub const WORKSPACE_ROOT: &str = "MEND_WORKSPACE_ROOT";
pub const LOG_DIR: &str = "MEND_LOG_DIR";
pub const STATE_DIR: &str = "MEND_STATE_DIR";

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Pipeline config file, if one was named
pub fn config_path() -> Option<PathBuf> {
    var(CONFIG).map(PathBuf::from)
}

/// Directory for rolling log files. Unset means stderr only.
pub fn log_dir() -> Option<PathBuf> {
    var(LOG_DIR).map(PathBuf::from)
}

/// Resolve state directory: MEND_STATE_DIR > XDG_STATE_HOME/mend > ~/.local/state/mend
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = var(STATE_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("mend"));
    }
    let home = var("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/mend"))
}

/// Apply `MEND_*` overrides from the process environment
pub fn apply_overrides(config: &mut PipelineConfig) -> Result<(), LifecycleError> {
    apply_overrides_with(config, var)
}

/// Apply overrides from `lookup`. Blank values are ignored.
pub fn apply_overrides_with(
    config: &mut PipelineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), LifecycleError> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(value) = get(MAX_ROUNDS) {
        let rounds = value.trim().parse::<u32>().ok().filter(|r| *r > 0);
        config.orchestrator.max_rounds = rounds.ok_or_else(|| invalid(MAX_ROUNDS, &value))?;
    }
    if let Some(value) = get(SANDBOX_PROVIDER) {
        config.sandbox.provider = value.parse::<SandboxProviderKind>()?;
    }
    if let Some(value) = get(ALLOW_LOCAL_FALLBACK) {
        config.sandbox.allow_local_fallback =
            parse_flag(&value).ok_or_else(|| invalid(ALLOW_LOCAL_FALLBACK, &value))?;
    }
    if let Some(value) = get(REMOTE_URL) {
        config.sandbox.remote_base_url = value.trim().trim_end_matches('/').to_string();
    }
    if let Some(value) = get(WORKSPACE_ROOT) {
        config.toolset.workspace_root = Some(PathBuf::from(value.trim()));
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str) -> LifecycleError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }.into()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
