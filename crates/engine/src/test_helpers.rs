// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine unit tests.

use crate::log_stream::JobLogSink;
use mend_core::{JobId, LogEntry, LogLevel};
use parking_lot::Mutex;
use std::sync::Arc;

/// Sink that keeps every entry in memory
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    entries: Arc<Mutex<Vec<(JobId, LogEntry)>>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entries(&self) -> Vec<(JobId, LogEntry)> {
        self.entries.lock().clone()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, e)| e.message.clone()).collect()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|(_, e)| e.message.contains(needle))
    }

    pub(crate) fn count_level(&self, level: LogLevel) -> usize {
        self.entries.lock().iter().filter(|(_, e)| e.level == level).count()
    }
}

impl JobLogSink for RecordingSink {
    fn emit(&self, job_id: &JobId, entry: LogEntry) {
        self.entries.lock().push((*job_id, entry));
    }
}
