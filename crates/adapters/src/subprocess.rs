// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with a deadline.
//!
//! Output is read line by line on reader tasks and handed to the caller over
//! a bounded channel, so a chatty child can never fill its pipe and stall.

use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Exit code reported when the deadline kills the child
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Timeout for short shell evaluations (collaborator hooks, status checks)
pub const SHELL_EVAL_TIMEOUT: Duration = Duration::from_secs(30);

const OUTPUT_CHANNEL_CAPACITY: usize = 256;
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{description} failed to start: {source}")]
    Spawn {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} stdin write failed: {source}")]
    Stdin {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} wait failed: {source}")]
    Wait {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// True when the program itself could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommandError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run `cmd` to completion or until `timeout` elapses.
///
/// On timeout the child is killed and the result carries
/// [`TIMEOUT_EXIT_CODE`] with whatever output arrived before the deadline.
pub async fn run_with_timeout(
    cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<CommandOutput, CommandError> {
    run_with_input(cmd, None, timeout, description).await
}

/// Like [`run_with_timeout`], writing `input` to the child's stdin first.
pub async fn run_with_input(
    mut cmd: Command,
    input: Option<&str>,
    timeout: Duration,
    description: &str,
) -> Result<CommandOutput, CommandError> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|source| CommandError::Spawn { description: description.to_string(), source })?;

    // Written on its own task so a child that answers before draining stdin
    // cannot stall on a full pipe
    let writer = match (input, child.stdin.take()) {
        (Some(input), Some(mut stdin)) => {
            let input = input.to_string();
            Some(tokio::spawn(async move {
                let result = stdin.write_all(input.as_bytes()).await;
                // Dropping closes the pipe so the child sees EOF
                drop(stdin);
                result
            }))
        }
        _ => None,
    };

    let (tx, mut rx) = mpsc::channel::<(Stream, String)>(OUTPUT_CHANNEL_CAPACITY);
    let mut readers = Vec::new();
    if let Some(out) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(out, Stream::Stdout, tx.clone())));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(err, Stream::Stderr, tx.clone())));
    }
    drop(tx);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut timed_out = false;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some((Stream::Stdout, line)) => push_line(&mut stdout, &line),
                Some((Stream::Stderr, line)) => push_line(&mut stderr, &line),
                None => break,
            },
            _ = &mut deadline => {
                timed_out = true;
                break;
            }
        }
    }

    let exit_code = if timed_out {
        kill(&mut child, description).await;
        TIMEOUT_EXIT_CODE
    } else {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| CommandError::Wait {
                    description: description.to_string(),
                    source,
                })?;
                status.code().unwrap_or(-1)
            }
            _ = &mut deadline => {
                timed_out = true;
                kill(&mut child, description).await;
                TIMEOUT_EXIT_CODE
            }
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;

    // Grandchildren may still hold the pipes open after a kill
    for mut reader in readers {
        if timed_out || tokio::time::timeout(READER_JOIN_TIMEOUT, &mut reader).await.is_err() {
            reader.abort();
        }
    }

    if let Some(writer) = writer {
        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe && !timed_out => {
                return Err(CommandError::Stdin { description: description.to_string(), source: e });
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(description, error = %e, "stdin writer task failed"),
        }
    }

    if timed_out {
        tracing::warn!(description, timeout_ms = timeout.as_millis() as u64, "command timed out");
    } else {
        tracing::debug!(description, exit_code, duration_ms, "command finished");
    }

    Ok(CommandOutput { exit_code, stdout, stderr, timed_out, duration_ms })
}

async fn kill(child: &mut tokio::process::Child, description: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(description, error = %e, "failed to kill timed-out command");
    }
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

async fn forward_lines<R: AsyncRead + Unpin>(
    reader: R,
    stream: Stream,
    tx: mpsc::Sender<(Stream, String)>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send((stream, line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "output reader stopped");
                break;
            }
        }
    }
}

/// `sh -c <script>` in `cwd`
pub fn shell_command(script: &str, cwd: &std::path::Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).current_dir(cwd);
    cmd
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
