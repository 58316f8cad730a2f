// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job repair memory.
//!
//! Tracks what repair has already tried so the loop can stop when it keeps
//! hitting the same failure, and so the repair collaborator can be told
//! which approaches did not work. Persisted through a [`TtlCache`] so a
//! restarted process can pick the context back up.

use mend_core::{Clock, JobId};
use mend_storage::TtlCache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::time::Duration;

const MAX_HISTORY: usize = 10;
/// All-failed attempts before [`SessionMemory::should_terminate`] gives up
const MAX_FAILED_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub round: u32,
    pub timestamp_ms: u64,
    pub files: Vec<String>,
    pub success: bool,
    pub error_signature: Option<String>,
    /// e.g. `symbol not found`
    pub error_type: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMemory {
    pub job_id: JobId,
    tolerance: u32,
    history: Vec<RepairAttempt>,
    signature_counts: BTreeMap<String, u32>,
    repaired_files: BTreeSet<String>,
    last_signature: Option<String>,
    consecutive_same: u32,
}

impl SessionMemory {
    pub fn new(job_id: JobId, tolerance: u32) -> Self {
        Self {
            job_id,
            tolerance: tolerance.max(1),
            history: Vec::new(),
            signature_counts: BTreeMap::new(),
            repaired_files: BTreeSet::new(),
            last_signature: None,
            consecutive_same: 0,
        }
    }

    pub fn history(&self) -> &[RepairAttempt] {
        &self.history
    }

    pub fn last_signature(&self) -> Option<&str> {
        self.last_signature.as_deref()
    }

    pub fn consecutive_same(&self) -> u32 {
        self.consecutive_same
    }

    pub fn signature_count(&self, signature: &str) -> u32 {
        self.signature_counts.get(signature).copied().unwrap_or(0)
    }

    /// Append an attempt, keeping only the most recent ten
    pub fn record_attempt(&mut self, attempt: RepairAttempt) {
        tracing::debug!(
            job_id = %self.job_id,
            round = attempt.round,
            files = attempt.files.len(),
            success = attempt.success,
            "recorded repair attempt"
        );
        self.repaired_files.extend(attempt.files.iter().cloned());
        self.history.push(attempt);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }

    /// Count `signature` and track consecutive repeats.
    ///
    /// Returns true once the same signature has been seen `tolerance` times
    /// in a row. A blank signature resets the streak.
    pub fn record_signature(&mut self, signature: &str) -> bool {
        if signature.trim().is_empty() {
            self.last_signature = None;
            self.consecutive_same = 0;
            return false;
        }
        *self.signature_counts.entry(signature.to_string()).or_default() += 1;
        if self.last_signature.as_deref() == Some(signature) {
            self.consecutive_same += 1;
        } else {
            self.last_signature = Some(signature.to_string());
            self.consecutive_same = 1;
        }
        self.consecutive_same >= self.tolerance
    }

    /// Would recording `signature` reach the repeat tolerance
    pub fn is_repeated(&self, signature: &str) -> bool {
        !signature.trim().is_empty()
            && self.last_signature.as_deref() == Some(signature)
            && self.consecutive_same + 1 >= self.tolerance
    }

    /// Repair is going nowhere: repeated signature, or every one of at
    /// least three attempts failed
    pub fn should_terminate(&self) -> bool {
        if self.consecutive_same >= self.tolerance {
            return true;
        }
        self.history.len() >= MAX_FAILED_ATTEMPTS && self.success_count() == 0
    }

    pub fn has_repaired_file(&self, file_name: &str) -> bool {
        self.repaired_files.contains(file_name)
    }

    pub fn attempt_count(&self) -> usize {
        self.history.len()
    }

    pub fn success_count(&self) -> usize {
        self.history.iter().filter(|a| a.success).count()
    }

    pub fn recent(&self, n: usize) -> &[RepairAttempt] {
        &self.history[self.history.len().saturating_sub(n)..]
    }

    /// History summary handed to the repair collaborator
    pub fn repair_context(&self) -> String {
        if self.history.is_empty() {
            return "(first repair, no history)\n".to_string();
        }

        let mut out = String::from("### Repair history\n");
        for attempt in &self.history {
            let _ = writeln!(
                out,
                "- round {}: repaired [{}] -> {} ({})",
                attempt.round,
                attempt.files.join(", "),
                if attempt.success { "succeeded" } else { "failed" },
                attempt.error_type,
            );
            if let Some(summary) = attempt.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                if !attempt.success {
                    let _ = writeln!(out, "  failure: {}", truncate(summary, 100));
                }
            }
        }

        let mut failed_by_type: BTreeMap<&str, Vec<&RepairAttempt>> = BTreeMap::new();
        for attempt in self.history.iter().filter(|a| !a.success && a.error_signature.is_some()) {
            failed_by_type.entry(attempt.error_type.as_str()).or_default().push(attempt);
        }
        if !failed_by_type.is_empty() {
            out.push_str("\n### Already tried\n");
            out.push_str("These fixes failed before; do not repeat them:\n");
            for (error_type, attempts) in &failed_by_type {
                let _ = writeln!(out, "- **{error_type}** ({} times)", attempts.len());
                for attempt in attempts {
                    let _ = writeln!(
                        out,
                        "  - round {} failed: {}",
                        attempt.round,
                        truncate(attempt.error_signature.as_deref().unwrap_or_default(), 60)
                    );
                }
            }
        }

        if self.consecutive_same >= 2 {
            out.push_str("\n### Warning\n");
            let _ = writeln!(
                out,
                "The same error has appeared {} times in a row; try a different approach.",
                self.consecutive_same
            );
            out.push_str("- check method signatures against their interfaces\n");
            out.push_str("- check return types match\n");
            out.push_str("- check for references to classes that were never generated\n");
        }
        out
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

/// JSON-encoded [`SessionMemory`] records with bounded retention
#[derive(Clone)]
pub struct SessionMemoryStore<C: Clock> {
    cache: TtlCache<JobId, String, C>,
    tolerance: u32,
}

impl<C: Clock> SessionMemoryStore<C> {
    pub fn new(ttl: Duration, tolerance: u32, clock: C) -> Self {
        Self { cache: TtlCache::new(ttl, clock), tolerance }
    }

    /// Stored memory for `job_id`, or a fresh one.
    ///
    /// An undecodable record is discarded with a warning.
    pub fn get_or_create(&self, job_id: JobId) -> SessionMemory {
        let Some(json) = self.cache.get(&job_id) else {
            return SessionMemory::new(job_id, self.tolerance);
        };
        match serde_json::from_str::<SessionMemory>(&json) {
            Ok(memory) => {
                tracing::debug!(%job_id, attempts = memory.attempt_count(), "restored session memory");
                memory
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "discarding unreadable session memory");
                self.cache.remove(&job_id);
                SessionMemory::new(job_id, self.tolerance)
            }
        }
    }

    pub fn save(&self, memory: &SessionMemory) {
        match serde_json::to_string(memory) {
            Ok(json) => self.cache.insert(memory.job_id, json),
            Err(e) => tracing::warn!(job_id = %memory.job_id, error = %e, "failed to encode session memory"),
        }
    }

    pub fn remove(&self, job_id: &JobId) {
        self.cache.remove(job_id);
    }

    /// Raw record, for inspection
    pub fn raw(&self, job_id: &JobId) -> Option<String> {
        self.cache.get(job_id)
    }

    pub fn insert_raw(&self, job_id: JobId, json: impl Into<String>) {
        self.cache.insert(job_id, json.into());
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
