// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mend_core::FakeClock;

fn attempt(round: u32, success: bool, signature: &str) -> RepairAttempt {
    RepairAttempt {
        round,
        timestamp_ms: 0,
        files: vec![format!("File{round}.java")],
        success,
        error_signature: Some(signature.to_string()),
        error_type: "symbol not found".to_string(),
        summary: (!success).then(|| "still broken".to_string()),
    }
}

#[test]
fn repeated_signature_reaches_tolerance() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    assert!(!memory.record_signature("abc"));
    assert!(memory.is_repeated("abc"));
    assert!(!memory.is_repeated("def"));
    assert!(memory.record_signature("abc"));
    assert_eq!(memory.consecutive_same(), 2);
    assert!(memory.should_terminate());
}

#[test]
fn new_signature_resets_streak() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    memory.record_signature("abc");
    assert!(!memory.record_signature("def"));
    assert_eq!(memory.consecutive_same(), 1);
    assert_eq!(memory.signature_count("abc"), 1);
    assert_eq!(memory.last_signature(), Some("def"));
}

#[test]
fn blank_signature_clears_state() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    memory.record_signature("abc");
    assert!(!memory.record_signature("  "));
    assert_eq!(memory.last_signature(), None);
    assert_eq!(memory.consecutive_same(), 0);
    assert!(!memory.is_repeated(""));
}

#[test]
fn three_failed_attempts_terminate() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    memory.record_attempt(attempt(0, false, "a"));
    memory.record_attempt(attempt(1, false, "b"));
    assert!(!memory.should_terminate());
    memory.record_attempt(attempt(2, false, "c"));
    assert!(memory.should_terminate());
}

#[test]
fn one_success_keeps_going() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    memory.record_attempt(attempt(0, false, "a"));
    memory.record_attempt(attempt(1, true, "b"));
    memory.record_attempt(attempt(2, false, "c"));
    assert!(!memory.should_terminate());
    assert_eq!(memory.success_count(), 1);
}

#[test]
fn history_is_bounded() {
    let mut memory = SessionMemory::new(JobId::new(), 2);
    for round in 0..15 {
        memory.record_attempt(attempt(round, true, "a"));
    }
    assert_eq!(memory.attempt_count(), 10);
    assert_eq!(memory.history()[0].round, 5);
    assert_eq!(memory.recent(2).len(), 2);
    assert_eq!(memory.recent(2)[1].round, 14);
    assert_eq!(memory.recent(50).len(), 10);
    // Files from trimmed attempts are still remembered
    assert!(memory.has_repaired_file("File0.java"));
}

#[test]
fn empty_context_says_first_repair() {
    let memory = SessionMemory::new(JobId::new(), 2);
    assert!(memory.repair_context().contains("first repair"));
}

#[test]
fn context_lists_history_and_failed_approaches() {
    let mut memory = SessionMemory::new(JobId::new(), 3);
    memory.record_attempt(attempt(0, false, "sig-a"));
    memory.record_attempt(attempt(1, true, "sig-b"));
    memory.record_signature("sig-a");
    memory.record_signature("sig-a");

    let context = memory.repair_context();
    assert!(context.contains("round 0: repaired [File0.java] -> failed (symbol not found)"));
    assert!(context.contains("round 1: repaired [File1.java] -> succeeded"));
    assert!(context.contains("failure: still broken"));
    assert!(context.contains("**symbol not found** (1 times)"));
    assert!(context.contains("round 0 failed: sig-a"));
    assert!(context.contains("appeared 2 times in a row"));
}

#[test]
fn store_round_trips_through_json() {
    let clock = FakeClock::new();
    let store = SessionMemoryStore::new(Duration::from_secs(3600), 2, clock.clone());
    let job_id = JobId::new();

    let mut memory = store.get_or_create(job_id);
    memory.record_signature("abc");
    memory.record_attempt(attempt(0, false, "abc"));
    store.save(&memory);

    let restored = store.get_or_create(job_id);
    assert_eq!(restored, memory);
}

#[test]
fn store_expires_after_ttl() {
    let clock = FakeClock::new();
    let store = SessionMemoryStore::new(Duration::from_secs(60), 2, clock.clone());
    let job_id = JobId::new();
    let mut memory = store.get_or_create(job_id);
    memory.record_signature("abc");
    store.save(&memory);

    clock.advance(Duration::from_secs(61));
    assert!(store.raw(&job_id).is_none());
    assert_eq!(store.get_or_create(job_id).attempt_count(), 0);
    assert_eq!(store.get_or_create(job_id).last_signature(), None);
}

#[test]
fn unreadable_record_is_replaced() {
    let store = SessionMemoryStore::new(Duration::from_secs(60), 2, FakeClock::new());
    let job_id = JobId::new();
    store.insert_raw(job_id, "{not json");
    let memory = store.get_or_create(job_id);
    assert_eq!(memory.job_id, job_id);
    assert!(store.raw(&job_id).is_none());
}
