// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn constructors_set_level() {
    assert_eq!(LogEntry::info(LogRole::Planner, "x").level, LogLevel::Info);
    assert_eq!(LogEntry::success(LogRole::Coder, "x").level, LogLevel::Success);
    assert_eq!(LogEntry::warn(LogRole::Validator, "x").level, LogLevel::Warn);
    assert_eq!(LogEntry::error(LogRole::Repair, "x").level, LogLevel::Error);
}

#[test]
fn heartbeat_is_system_entry() {
    let hb = LogEntry::heartbeat();
    assert!(hb.is_heartbeat());
    assert_eq!(hb.role, LogRole::System);
    assert!(!LogEntry::info(LogRole::System, "x").is_heartbeat());
}

#[test]
fn timestamp_is_rfc3339_utc() {
    let entry = LogEntry::info(LogRole::System, "x");
    assert!(entry.timestamp.ends_with('Z'), "{}", entry.timestamp);
    assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
}

#[test]
fn serializes_lowercase_tags() {
    let entry = LogEntry::warn(LogRole::Repair, "retrying");
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["role"], "repair");
    assert_eq!(json["level"], "warn");
    assert_eq!(json["message"], "retrying");
}
