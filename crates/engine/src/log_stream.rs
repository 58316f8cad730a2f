// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job log persistence and live fan-out.
//!
//! Every entry is appended to the [`JobStore`] and then broadcast while the
//! hub lock is held, so a subscriber that reads history under the same lock
//! sees each entry exactly once. Broadcast is best-effort: a lagging
//! receiver loses entries rather than slowing the job down.

use futures_util::Stream;
use mend_core::{JobId, LogEntry};
use mend_storage::{JobStore, StoreError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const CHANNEL_CAPACITY: usize = 1024;

/// Destination for product-level job log entries
pub trait JobLogSink: Send + Sync {
    fn emit(&self, job_id: &JobId, entry: LogEntry);
}

impl<T: JobLogSink + ?Sized> JobLogSink for Arc<T> {
    fn emit(&self, job_id: &JobId, entry: LogEntry) {
        (**self).emit(job_id, entry)
    }
}

/// Persists job logs and fans them out to live subscribers
#[derive(Clone)]
pub struct LogHub<S: JobStore> {
    store: S,
    channels: Arc<Mutex<HashMap<JobId, broadcast::Sender<LogEntry>>>>,
    heartbeat: Duration,
}

impl<S: JobStore> LogHub<S> {
    pub fn new(store: S) -> Self {
        Self { store, channels: Arc::new(Mutex::new(HashMap::new())), heartbeat: HEARTBEAT_INTERVAL }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Persist `entry`, then deliver it to current subscribers
    pub fn publish(&self, job_id: &JobId, entry: LogEntry) {
        let channels = self.channels.lock();
        if let Err(e) = self.store.append_log(job_id, &entry) {
            tracing::warn!(%job_id, error = %e, "failed to persist job log entry");
        }
        if let Some(tx) = channels.get(job_id) {
            // No receivers is fine
            let _ = tx.send(entry);
        }
    }

    /// Persisted history followed by live entries.
    ///
    /// A job that is already terminal yields its history and ends.
    pub fn subscribe(&self, job_id: &JobId) -> Result<LogSubscription, StoreError> {
        let mut channels = self.channels.lock();
        let job = self.store.get_job(job_id)?.ok_or(StoreError::JobNotFound(*job_id))?;
        let history: VecDeque<LogEntry> = self.store.logs(job_id)?.into();
        let live = if job.state.is_terminal() {
            None
        } else {
            let tx = channels
                .entry(*job_id)
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
            Some(tx.subscribe())
        };
        tracing::debug!(%job_id, replay = history.len(), live = live.is_some(), "log subscriber joined");
        Ok(LogSubscription { job_id: *job_id, history, live, heartbeat: self.heartbeat })
    }

    /// End every subscription for `job_id` once buffered entries drain
    pub fn close(&self, job_id: &JobId) {
        if self.channels.lock().remove(job_id).is_some() {
            tracing::debug!(%job_id, "closed job log stream");
        }
    }

    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.channels.lock().get(job_id).map_or(0, |tx| tx.receiver_count())
    }
}

impl<S: JobStore> JobLogSink for LogHub<S> {
    fn emit(&self, job_id: &JobId, entry: LogEntry) {
        tracing::debug!(%job_id, role = %entry.role, level = %entry.level, "{}", entry.message);
        self.publish(job_id, entry);
    }
}

/// One subscriber's view of a job log
pub struct LogSubscription {
    job_id: JobId,
    history: VecDeque<LogEntry>,
    live: Option<broadcast::Receiver<LogEntry>>,
    heartbeat: Duration,
}

impl LogSubscription {
    /// Next entry, a heartbeat after an idle interval, or `None` once the
    /// job's stream is closed
    pub async fn next(&mut self) -> Option<LogEntry> {
        if let Some(entry) = self.history.pop_front() {
            return Some(entry);
        }
        let rx = self.live.as_mut()?;
        loop {
            match tokio::time::timeout(self.heartbeat, rx.recv()).await {
                Err(_) => return Some(LogEntry::heartbeat()),
                Ok(Ok(entry)) => return Some(entry),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(job_id = %self.job_id, skipped, "log subscriber lagged");
                }
                Ok(Err(RecvError::Closed)) => {
                    self.live = None;
                    return None;
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = LogEntry> {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|entry| (entry, sub))
        })
    }
}

#[cfg(test)]
#[path = "log_stream_tests.rs"]
mod tests;
