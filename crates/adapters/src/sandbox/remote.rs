// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the remote build-sandbox service.
//!
//! JSON over HTTP: create, write-files, execute, status and kill endpoints.

use super::{ExecOutput, SandboxAdapter, SandboxError, SandboxSession};
use async_trait::async_trait;
use mend_core::{Artifact, JobId, SandboxConfig};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const CREATE_PATH: &str = "/api/create-ai-sandbox-v2";
const WRITE_PATH: &str = "/api/sandbox/write-files";
const EXEC_PATH: &str = "/api/sandbox/execute";
const KILL_PATH: &str = "/api/sandbox/kill";
const STATUS_PATH: &str = "/api/sandbox-status";

/// Extra slack on top of the command timeout for the HTTP round trip
const EXEC_GRACE: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RemoteSandbox {
    client: reqwest::Client,
    base_url: String,
    template: String,
    workdir: String,
    session_timeout: Duration,
    request_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    template: &'a str,
    timeout: u64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    sandbox_id: Option<String>,
    url: Option<String>,
    provider: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    sandbox_id: &'a str,
    files: Vec<RemoteFile<'a>>,
}

#[derive(Serialize)]
struct RemoteFile<'a> {
    path: String,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecRequest<'a> {
    sandbox_id: &'a str,
    command: String,
    timeout: u64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ExecResponse {
    success: Option<bool>,
    exit_code: Option<i32>,
    stdout: Option<String>,
    stderr: Option<String>,
    output: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KillRequest<'a> {
    sandbox_id: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    active: Option<bool>,
    healthy: Option<bool>,
    sandbox_data: Option<StatusData>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    sandbox_id: Option<String>,
}

impl RemoteSandbox {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SandboxError> {
        Self::from_config(&SandboxConfig { remote_base_url: base_url.into(), ..Default::default() })
    }

    pub fn from_config(config: &SandboxConfig) -> Result<Self, SandboxError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SandboxError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.remote_base_url.trim_end_matches('/').to_string(),
            template: config.remote_template.clone(),
            workdir: config.remote_workdir.trim_end_matches('/').to_string(),
            session_timeout: config.session_ttl(),
            request_timeout: Duration::from_secs(config.remote_request_timeout_seconds),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R, SandboxError> {
        let request = self.client.post(self.url(path)).json(body).timeout(timeout);
        self.send("POST", path, request).await
    }

    async fn send<R: DeserializeOwned + Default>(
        &self,
        method: &'static str,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<R, SandboxError> {
        let start = Instant::now();
        let response = request.send().await.map_err(|e| SandboxError::Request {
            method,
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| SandboxError::Request {
            method,
            path: path.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            method,
            path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sandbox request"
        );
        if !status.is_success() {
            return Err(SandboxError::Status { status: status.as_u16(), path: path.to_string(), body });
        }
        if body.trim().is_empty() {
            return Ok(R::default());
        }
        serde_json::from_str(&body)
            .map_err(|e| SandboxError::Protocol(format!("{path}: {e}: {}", preview(&body))))
    }

    fn remote_path(&self, relative: &str) -> String {
        format!("{}/{}", self.workdir, relative.trim_start_matches('/'))
    }

    fn check_session_id(session: &SandboxSession, active: Option<&str>) -> Result<(), SandboxError> {
        match active {
            Some(actual) if actual != session.id => Err(SandboxError::SessionMismatch {
                expected: session.id.clone(),
                actual: actual.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SandboxAdapter for RemoteSandbox {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn create(&self, job_id: &JobId, _round: u32) -> Result<SandboxSession, SandboxError> {
        let response: CreateResponse = self
            .post(
                CREATE_PATH,
                &CreateRequest { template: &self.template, timeout: self.session_timeout.as_secs() },
                self.request_timeout,
            )
            .await?;
        let Some(id) = response.sandbox_id.filter(|id| !id.is_empty()) else {
            return Err(SandboxError::Protocol(format!(
                "create returned no sandboxId{}",
                response.error.map(|e| format!(": {e}")).unwrap_or_default()
            )));
        };
        tracing::info!(%job_id, sandbox_id = %id, "created remote sandbox");
        Ok(SandboxSession {
            id,
            provider: response.provider.unwrap_or_else(|| self.name().to_string()),
            endpoint: response.url,
            work_dir: None,
            created_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        })
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        artifacts: &[Artifact],
    ) -> Result<(), SandboxError> {
        let files = artifacts
            .iter()
            .map(|a| {
                super::checked_relative_path(&a.path)
                    .map(|_| RemoteFile { path: self.remote_path(&a.path), content: &a.content })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let count = files.len();
        let _: serde_json::Value = self
            .post(WRITE_PATH, &WriteRequest { sandbox_id: &session.id, files }, self.request_timeout)
            .await?;
        tracing::debug!(sandbox_id = %session.id, count, "synced files to remote sandbox");
        Ok(())
    }

    async fn exec(
        &self,
        session: &SandboxSession,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let start = Instant::now();
        let request = ExecRequest {
            sandbox_id: &session.id,
            command: format!("cd {} && {}", self.workdir, command),
            timeout: timeout.as_secs(),
        };
        let response: ExecResponse = self.post(EXEC_PATH, &request, timeout + EXEC_GRACE).await?;
        Ok(exec_output(response, start.elapsed()))
    }

    async fn is_alive(&self, session: &SandboxSession) -> bool {
        let request = self.client.get(self.url(STATUS_PATH)).timeout(self.request_timeout);
        let status: StatusResponse = match self.send("GET", STATUS_PATH, request).await {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(sandbox_id = %session.id, error = %e, "sandbox status check failed");
                return false;
            }
        };
        let active = status.active.unwrap_or(false) && status.healthy.unwrap_or(true);
        let current = status.sandbox_data.and_then(|d| d.sandbox_id);
        match Self::check_session_id(session, current.as_deref()) {
            Ok(()) => active && current.is_some(),
            Err(e) => {
                tracing::debug!(error = %e, "remote sandbox replaced");
                false
            }
        }
    }

    async fn destroy(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        let _: serde_json::Value = self
            .post(KILL_PATH, &KillRequest { sandbox_id: &session.id }, self.request_timeout)
            .await?;
        tracing::info!(sandbox_id = %session.id, "killed remote sandbox");
        Ok(())
    }
}

fn exec_output(response: ExecResponse, elapsed: Duration) -> ExecOutput {
    let stdout = response.stdout.or(response.output).unwrap_or_default();
    let stderr = response.stderr.or(response.error).or(response.message).unwrap_or_default();
    let exit_code = response
        .exit_code
        .or_else(|| parse_return_code(&stdout).or_else(|| parse_return_code(&stderr)))
        .unwrap_or(match response.success {
            Some(false) => 1,
            _ => 0,
        });
    ExecOutput { exit_code, stdout, stderr, duration_ms: elapsed.as_millis() as u64 }
}

/// `Return code: N` line echoed by some providers instead of an exit code
#[allow(clippy::expect_used)]
static RETURN_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Return\s+code:\s*(\d+)\s*$").expect("constant regex pattern is valid")
});

pub fn parse_return_code(output: &str) -> Option<i32> {
    RETURN_CODE.captures(output).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}

fn preview(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
