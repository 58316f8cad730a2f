// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role-tagged job log entries shown to live viewers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRole {
    Planner,
    Coder,
    Validator,
    Repair,
    System,
}

crate::simple_display! {
    LogRole {
        Planner => "planner",
        Coder => "coder",
        Validator => "validator",
        Repair => "repair",
        System => "system",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    Heartbeat,
}

crate::simple_display! {
    LogLevel {
        Info => "info",
        Success => "success",
        Warn => "warn",
        Error => "error",
        Heartbeat => "heartbeat",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339, UTC, second precision
    pub timestamp: String,
    pub role: LogRole,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(role: LogRole, level: LogLevel, message: impl Into<String>) -> Self {
        Self { timestamp: utc_now(), role, message: message.into(), level }
    }

    pub fn info(role: LogRole, message: impl Into<String>) -> Self {
        Self::new(role, LogLevel::Info, message)
    }

    pub fn success(role: LogRole, message: impl Into<String>) -> Self {
        Self::new(role, LogLevel::Success, message)
    }

    pub fn warn(role: LogRole, message: impl Into<String>) -> Self {
        Self::new(role, LogLevel::Warn, message)
    }

    pub fn error(role: LogRole, message: impl Into<String>) -> Self {
        Self::new(role, LogLevel::Error, message)
    }

    pub fn heartbeat() -> Self {
        Self::new(LogRole::System, LogLevel::Heartbeat, "heartbeat")
    }

    pub fn is_heartbeat(&self) -> bool {
        self.level == LogLevel::Heartbeat
    }
}

fn utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
#[path = "log_entry_tests.rs"]
mod tests;
