// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy-gated tools for agents: shell commands in the job sandbox, and
//! reads and searches confined to the workspace root.
//!
//! Every tool asks the hook pipeline first, applies its own policy, and
//! reports the outcome through `after_tool`, blocked or not.

use crate::hooks::mask::{mask_sensitive, truncate, truncate_output, TRUNCATED_MARKER};
use crate::hooks::HookPipeline;
use crate::log_stream::JobLogSink;
use crate::sandbox::SandboxService;
use mend_adapters::{SandboxAdapter, SandboxError};
use mend_core::{Clock, HookContext, HookEvent, HookResult, Job, LogEntry, LogRole, ToolsetConfig};
use regex::Regex;
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_MAX_LINES: usize = 200;
pub const DEFAULT_MAX_MATCHES: usize = 50;
pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 2000;

#[allow(clippy::expect_used)]
static DANGEROUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[;&|><`]|\$\(").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static JAVA_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(class|interface|enum)\s+\w+").expect("constant regex pattern is valid")
});

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("toolset is disabled")]
    Disabled,
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("path escapes workspace: {0}")]
    PathViolation(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file type not allowed: {0}")]
    ExtensionNotAllowed(String),
    #[error("file too large: {0}")]
    TooLarge(String),
    #[error("no sandbox bound to job")]
    NoSandbox,
    #[error("nothing readable")]
    NothingRead,
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One entry of a batch read; `content` is `Err` with the failure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRead {
    pub path: String,
    pub content: Result<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRead {
    pub items: Vec<FileRead>,
    pub success_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Relative to the workspace root, `/`-separated
    pub path: String,
    pub line_number: usize,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub files: usize,
}

pub struct Toolset<S: SandboxAdapter, C: Clock> {
    config: ToolsetConfig,
    hooks: HookPipeline,
    sandbox: Option<Arc<SandboxService<S, C>>>,
}

impl<S: SandboxAdapter, C: Clock> Toolset<S, C> {
    pub fn new(config: ToolsetConfig, hooks: HookPipeline) -> Self {
        Self { config, hooks, sandbox: None }
    }

    /// Bind the sandbox service that runs `shell` commands
    pub fn with_sandbox(mut self, sandbox: Arc<SandboxService<S, C>>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn config(&self) -> &ToolsetConfig {
        &self.config
    }

    /// Run `command` in the job's live sandbox session.
    ///
    /// Shell metacharacters are rejected outright; the leading token must
    /// be allowed and not denied. Output is masked and truncated.
    pub async fn run_command(
        &self,
        job: &Job,
        command: &str,
        timeout: Option<Duration>,
        log: &dyn JobLogSink,
    ) -> Result<CommandOutput, ToolError> {
        self.ensure_enabled()?;
        if command.trim().is_empty() {
            return Err(ToolError::EmptyInput("command"));
        }
        let ctx = self.before(job, "shell", command)?;
        if let Some(reason) = self.command_reject_reason(command) {
            return Err(self.reject(&ctx, reason));
        }
        let Some(sandbox) = &self.sandbox else {
            return Err(self.reject_with(&ctx, ToolError::NoSandbox));
        };

        log.emit(&job.id, LogEntry::info(LogRole::System, format!("toolset command: {command}")));
        let timeout =
            timeout.unwrap_or(Duration::from_secs(self.config.default_timeout_seconds));
        let exec = match sandbox.execute_command(&job.id, command, timeout).await {
            Ok(exec) => exec,
            Err(SandboxError::NoSession(_)) => {
                return Err(self.reject_with(&ctx, ToolError::NoSandbox));
            }
            Err(e) => {
                let error = ToolError::Sandbox(e);
                self.after(&ctx, false, None, Some(error.to_string()));
                return Err(error);
            }
        };

        let output = CommandOutput {
            stdout: self.trim(&mask_sensitive(&exec.stdout)),
            stderr: self.trim(&mask_sensitive(&exec.stderr)),
            exit_code: exec.exit_code,
            duration_ms: exec.duration_ms,
        };
        if !output.success() {
            log.emit(
                &job.id,
                LogEntry::warn(
                    LogRole::System,
                    format!("toolset command failed: exit {}", output.exit_code),
                ),
            );
        }
        let failure = (!output.success()).then(|| format!("exit {}", output.exit_code));
        self.after_timed(
            &ctx,
            output.success(),
            Some(output.exit_code),
            failure,
            output.duration_ms,
        );
        Ok(output)
    }

    /// Read one workspace file, at most `max_lines` lines (default 200)
    pub fn read_file(
        &self,
        job: &Job,
        path: &str,
        max_lines: Option<usize>,
    ) -> Result<String, ToolError> {
        self.ensure_enabled()?;
        if path.trim().is_empty() {
            return Err(ToolError::EmptyInput("path"));
        }
        let ctx = self.before(job, "read_file", path)?;
        let result = self.read_checked(path, max_lines.unwrap_or(DEFAULT_MAX_LINES));
        self.finish(&ctx, &result);
        result
    }

    /// Read up to `max_batch_files` paths. Blank and repeated paths are
    /// skipped; per-file failures are reported inline.
    pub fn read_files(
        &self,
        job: &Job,
        paths: &[String],
        max_lines: Option<usize>,
    ) -> Result<BatchRead, ToolError> {
        self.ensure_enabled()?;
        if paths.is_empty() {
            return Err(ToolError::EmptyInput("paths"));
        }
        let ctx = self.before(job, "read_files", &format!("count={}", paths.len()))?;
        let result = self.read_batch(paths, max_lines.unwrap_or(DEFAULT_MAX_LINES));
        self.finish(&ctx, &result);
        result
    }

    /// Substring search across allowed workspace files
    pub fn search_workspace(
        &self,
        job: &Job,
        query: &str,
        max_matches: Option<usize>,
    ) -> Result<Vec<SearchMatch>, ToolError> {
        self.ensure_enabled()?;
        if query.trim().is_empty() {
            return Err(ToolError::EmptyInput("query"));
        }
        let ctx = self.before(job, "search_workspace", query)?;
        let result = self.search(query, max_matches.unwrap_or(DEFAULT_MAX_MATCHES));
        self.finish(&ctx, &result);
        result
    }

    /// Short per-file outlines (declarations, exported names, top-level
    /// keys, headings) capped at `max_summary_chars` (default 2000)
    pub fn summarize_files(
        &self,
        job: &Job,
        paths: &[String],
        max_lines: Option<usize>,
        max_summary_chars: Option<usize>,
    ) -> Result<Summary, ToolError> {
        self.ensure_enabled()?;
        if paths.is_empty() {
            return Err(ToolError::EmptyInput("paths"));
        }
        let ctx = self.before(job, "summarize_files", &format!("count={}", paths.len()))?;
        let result = self
            .read_batch(paths, max_lines.unwrap_or(DEFAULT_MAX_LINES))
            .and_then(|batch| {
                summarize(&batch, max_summary_chars.unwrap_or(DEFAULT_MAX_SUMMARY_CHARS))
            });
        self.finish(&ctx, &result);
        result
    }

    fn ensure_enabled(&self) -> Result<(), ToolError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(ToolError::Disabled)
        }
    }

    fn before(&self, job: &Job, tool: &str, input: &str) -> Result<HookContext, ToolError> {
        let ctx = HookContext::tool(HookEvent::BeforeTool, tool, input).for_job(job);
        let decision = self.hooks.before_tool(&ctx);
        if decision.is_blocked() {
            let reason = decision.reason().to_string();
            let after =
                ctx.with_event(HookEvent::AfterTool).success(false).error_message(reason.clone());
            self.hooks.after_tool(&after, &decision);
            return Err(ToolError::Blocked(reason));
        }
        Ok(ctx)
    }

    /// Policy rejection after the hooks allowed the call
    fn reject(&self, ctx: &HookContext, reason: String) -> ToolError {
        self.reject_with(ctx, ToolError::Blocked(reason))
    }

    fn reject_with(&self, ctx: &HookContext, error: ToolError) -> ToolError {
        let reason = match &error {
            ToolError::Blocked(reason) => reason.clone(),
            other => other.to_string(),
        };
        let after = ctx
            .clone()
            .with_event(HookEvent::AfterTool)
            .success(false)
            .error_message(reason.clone());
        self.hooks.after_tool(&after, &HookResult::block(reason));
        error
    }

    fn finish<T>(&self, ctx: &HookContext, result: &Result<T, ToolError>) {
        match result {
            Ok(_) => self.after(ctx, true, Some(0), None),
            Err(e) => self.after(ctx, false, Some(1), Some(e.to_string())),
        }
    }

    fn after(&self, ctx: &HookContext, success: bool, exit_code: Option<i32>, error: Option<String>) {
        self.after_timed(ctx, success, exit_code, error, 0);
    }

    fn after_timed(
        &self,
        ctx: &HookContext,
        success: bool,
        exit_code: Option<i32>,
        error: Option<String>,
        duration_ms: u64,
    ) {
        let mut after = ctx.clone().with_event(HookEvent::AfterTool).success(success);
        if let Some(code) = exit_code {
            after = after.exit_code(code);
        }
        if let Some(error) = error {
            after = after.error_message(error);
        }
        if duration_ms > 0 {
            after = after.duration_ms(duration_ms);
        }
        self.hooks.after_tool(&after, &HookResult::allow());
    }

    fn command_reject_reason(&self, command: &str) -> Option<String> {
        if DANGEROUS.is_match(command) {
            return Some("command contains shell metacharacters".to_string());
        }
        let base = command.split_whitespace().next()?;
        if self.config.deny_commands.iter().any(|c| c == base) {
            return Some(format!("command denied by policy: {base}"));
        }
        if !self.config.allow_commands.iter().any(|c| c == base) {
            return Some(format!("command not allowed: {base}"));
        }
        None
    }

    fn trim(&self, output: &str) -> String {
        truncate_output(output, self.config.max_output_lines, self.config.max_output_chars)
    }

    fn root(&self) -> Result<PathBuf, ToolError> {
        let root = match &self.config.workspace_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        Ok(root.canonicalize()?)
    }

    /// Resolve `path` under the root, rejecting anything that leaves it
    /// lexically or through symlinks
    fn resolve(&self, root: &Path, path: &str) -> Result<PathBuf, ToolError> {
        let escape = || ToolError::PathViolation(path.to_string());
        let joined = normalize(&root.join(path)).ok_or_else(escape)?;
        if !joined.starts_with(root) {
            return Err(escape());
        }
        if !joined.exists() {
            return Err(ToolError::NotFound(path.to_string()));
        }
        let real = joined.canonicalize()?;
        if !real.starts_with(root) {
            return Err(escape());
        }
        Ok(real)
    }

    fn read_checked(&self, path: &str, max_lines: usize) -> Result<String, ToolError> {
        let root = self.root()?;
        let target = self.resolve(&root, path)?;
        if !target.is_file() {
            return Err(ToolError::NotFound(path.to_string()));
        }
        if !self.allowed_extension(&target) {
            return Err(ToolError::ExtensionNotAllowed(path.to_string()));
        }
        if too_large(&target, self.config.max_file_size_bytes) {
            return Err(ToolError::TooLarge(path.to_string()));
        }

        let reader = BufReader::new(std::fs::File::open(&target)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            if lines.len() >= max_lines {
                lines.push(TRUNCATED_MARKER.to_string());
                break;
            }
            lines.push(line?);
        }
        Ok(lines.join("\n"))
    }

    fn read_batch(&self, paths: &[String], max_lines: usize) -> Result<BatchRead, ToolError> {
        let limit = match self.config.max_batch_files {
            0 => paths.len(),
            max => paths.len().min(max),
        };
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for path in &paths[..limit] {
            if path.trim().is_empty() || !seen.insert(path.as_str()) {
                continue;
            }
            let content = self.read_checked(path, max_lines).map_err(|e| e.to_string());
            items.push(FileRead { path: path.clone(), content });
        }
        if items.is_empty() {
            return Err(ToolError::NothingRead);
        }
        let success_count = items.iter().filter(|i| i.content.is_ok()).count();
        Ok(BatchRead { items, success_count })
    }

    fn search(&self, query: &str, max_matches: usize) -> Result<Vec<SearchMatch>, ToolError> {
        let root = self.root()?;
        let mut matches = Vec::new();
        let mut scanned = 0;
        let files = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file());
        for entry in files {
            if matches.len() >= max_matches || scanned >= self.config.max_search_files {
                break;
            }
            let path = entry.path();
            if self.excluded(path) || !self.allowed_extension(path) {
                continue;
            }
            scanned += 1;
            if too_large(path, self.config.max_search_file_size_bytes) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                tracing::debug!(path = %path.display(), "search skipped unreadable file");
                continue;
            };
            let relative = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            for (i, line) in content.lines().enumerate() {
                if line.contains(query) {
                    matches.push(SearchMatch {
                        path: relative.clone(),
                        line_number: i + 1,
                        line: line.trim().to_string(),
                    });
                    if matches.len() >= max_matches {
                        break;
                    }
                }
            }
        }
        Ok(matches)
    }

    fn allowed_extension(&self, path: &Path) -> bool {
        if self.config.allow_file_extensions.is_empty() {
            return true;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.config.allow_file_extensions.iter().any(|ext| name.ends_with(&ext.to_lowercase()))
    }

    fn excluded(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.config
            .exclude_path_contains
            .iter()
            .filter(|fragment| !fragment.trim().is_empty())
            .any(|fragment| normalized.contains(&fragment.replace('\\', "/")))
    }
}

/// Lexical `.`/`..` resolution; `None` when `..` climbs past the top
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Zero means unlimited; unreadable metadata counts as too large
fn too_large(path: &Path, max_bytes: u64) -> bool {
    max_bytes > 0 && std::fs::metadata(path).map(|m| m.len() > max_bytes).unwrap_or(true)
}

fn summarize(batch: &BatchRead, max_chars: usize) -> Result<Summary, ToolError> {
    let mut text = String::from("### workspace summary\n");
    let mut files = 0;
    for item in &batch.items {
        let Ok(content) = &item.content else {
            continue;
        };
        let outline = mask_sensitive(&outline(&item.path, content));
        if outline.is_empty() {
            continue;
        }
        text.push_str(&format!("#### {}\n{outline}\n", item.path));
        files += 1;
        if text.chars().count() >= max_chars {
            break;
        }
    }
    if files == 0 {
        return Err(ToolError::NothingRead);
    }
    Ok(Summary { text: truncate(&text, max_chars), files })
}

fn outline(path: &str, content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let lower = path.to_lowercase();
    let picked = if lower.ends_with(".java") {
        outline_java(&lines)
    } else if [".ts", ".tsx", ".js"].iter().any(|ext| lower.ends_with(ext)) {
        pick(&lines, 6, |l| l.trim().starts_with("export "))
    } else if lower.ends_with(".yml") || lower.ends_with(".yaml") {
        pick(&lines, 8, |l| {
            !l.starts_with(' ') && l.contains(':') && !l.trim().starts_with('#')
        })
    } else if lower.ends_with(".xml") {
        lines
            .iter()
            .map(|l| l.trim())
            .find(|l| l.starts_with('<') && !l.starts_with("<?xml") && !l.starts_with("</"))
            .map(|l| l.to_string())
            .unwrap_or_default()
    } else if lower.ends_with(".properties") {
        pick(&lines, 8, |l| !l.trim().starts_with('#') && l.contains('='))
    } else if lower.ends_with(".md") {
        pick(&lines, 5, |l| l.trim().starts_with('#'))
    } else {
        String::new()
    };
    if picked.is_empty() {
        pick(&lines, 5, |l| !l.trim().is_empty())
    } else {
        picked
    }
}

fn outline_java(lines: &[&str]) -> String {
    let package = lines.iter().map(|l| l.trim()).find(|l| l.starts_with("package "));
    let declarations = pick(lines, 5, |l| JAVA_DECLARATION.is_match(l));
    match (package, declarations.is_empty()) {
        (Some(package), true) => package.to_string(),
        (Some(package), false) => format!("{package}\n{declarations}"),
        (None, _) => declarations,
    }
}

fn pick(lines: &[&str], limit: usize, keep: impl Fn(&str) -> bool) -> String {
    lines
        .iter()
        .filter(|l| keep(l))
        .map(|l| l.trim())
        .take(limit)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "toolset_tests.rs"]
mod tests;
