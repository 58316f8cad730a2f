// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExecOutput, SandboxAdapter, SandboxError, SandboxSession};
use async_trait::async_trait;
use mend_core::{Artifact, JobId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Recorded sandbox operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    Create { job_id: JobId, round: u32 },
    WriteFiles { session_id: String, paths: Vec<String> },
    Exec { session_id: String, command: String },
    IsAlive { session_id: String },
    Destroy { session_id: String },
}

struct FakeSandboxState {
    name: &'static str,
    calls: Vec<SandboxCall>,
    exec_results: VecDeque<Result<ExecOutput, SandboxError>>,
    create_errors: VecDeque<SandboxError>,
    write_errors: VecDeque<SandboxError>,
    alive: bool,
    created: u32,
}

/// Scripted sandbox provider for tests.
///
/// `exec` pops queued results in order and reports a clean build once the
/// queue is empty.
#[derive(Clone)]
pub struct FakeSandbox {
    inner: Arc<Mutex<FakeSandboxState>>,
}

impl Default for FakeSandbox {
    fn default() -> Self {
        Self::named("fake")
    }
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeSandboxState {
                name,
                calls: Vec::new(),
                exec_results: VecDeque::new(),
                create_errors: VecDeque::new(),
                write_errors: VecDeque::new(),
                alive: true,
                created: 0,
            })),
        }
    }

    pub fn push_exec(&self, output: ExecOutput) {
        self.inner.lock().exec_results.push_back(Ok(output));
    }

    /// Queue a build that exits `exit_code` with `stdout`
    pub fn push_build(&self, exit_code: i32, stdout: impl Into<String>) {
        self.push_exec(ExecOutput { exit_code, stdout: stdout.into(), ..Default::default() });
    }

    pub fn push_exec_error(&self, error: SandboxError) {
        self.inner.lock().exec_results.push_back(Err(error));
    }

    pub fn fail_next_create(&self, error: SandboxError) {
        self.inner.lock().create_errors.push_back(error);
    }

    pub fn fail_next_write(&self, error: SandboxError) {
        self.inner.lock().write_errors.push_back(error);
    }

    pub fn set_alive(&self, alive: bool) {
        self.inner.lock().alive = alive;
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.inner.lock().calls.clone()
    }

    pub fn created_count(&self) -> u32 {
        self.inner.lock().created
    }

    pub fn exec_count(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, SandboxCall::Exec { .. })).count()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SandboxCall::Destroy { session_id } => Some(session_id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SandboxAdapter for FakeSandbox {
    fn name(&self) -> &'static str {
        self.inner.lock().name
    }

    async fn create(&self, job_id: &JobId, round: u32) -> Result<SandboxSession, SandboxError> {
        let mut state = self.inner.lock();
        state.calls.push(SandboxCall::Create { job_id: *job_id, round });
        if let Some(err) = state.create_errors.pop_front() {
            return Err(err);
        }
        state.created += 1;
        state.alive = true;
        Ok(SandboxSession {
            id: format!("{}-{}", state.name, state.created),
            provider: state.name.to_string(),
            endpoint: None,
            work_dir: None,
            created_at_ms: 0,
        })
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        let mut state = self.inner.lock();
        state.calls.push(SandboxCall::WriteFiles {
            session_id: session.id.clone(),
            paths: artifacts.iter().map(|a| a.path.clone()).collect(),
        });
        match state.write_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let mut state = self.inner.lock();
        state
            .calls
            .push(SandboxCall::Exec { session_id: session.id.clone(), command: command.to_string() });
        state.exec_results.pop_front().unwrap_or_else(|| {
            Ok(ExecOutput { stdout: "BUILD SUCCESS\n".to_string(), ..Default::default() })
        })
    }

    async fn is_alive(&self, session: &SandboxSession) -> bool {
        let mut state = self.inner.lock();
        state.calls.push(SandboxCall::IsAlive { session_id: session.id.clone() });
        state.alive
    }

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        let mut state = self.inner.lock();
        state.calls.push(SandboxCall::Destroy { session_id: session.id.clone() });
        state.alive = false;
        Ok(())
    }
}
