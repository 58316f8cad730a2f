// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn new_ids_are_unique() {
    let ids: HashSet<TestId> = (0..64).map(|_| TestId::new()).collect();
    assert_eq!(ids.len(), 64);
}

#[test]
fn parse_round_trips_display() {
    let id = TestId::new();
    let parsed: TestId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn parse_rejects_garbage() {
    assert!(TestId::parse("not-a-uuid").is_err());
}

#[test]
fn short_takes_prefix() {
    let id = TestId::parse("0b5f1c2e-1111-4222-8333-444455556666").unwrap();
    assert_eq!(id.short(8), "0b5f1c2e");
}

#[test]
fn serializes_as_plain_string() {
    let id = TestId::parse("0b5f1c2e-1111-4222-8333-444455556666").unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"0b5f1c2e-1111-4222-8333-444455556666\"");
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
