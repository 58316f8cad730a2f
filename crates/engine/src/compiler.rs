// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiler output parsing and build-failure classification.

use mend_adapters::subprocess::TIMEOUT_EXIT_CODE;
use mend_adapters::ExecOutput;
use mend_core::{BuildResult, ErrorClass, ParsedError, Severity};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `[ERROR] /src/App.java:[12,5] error: cannot find symbol`
#[allow(clippy::expect_used)]
static STRUCTURED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(ERROR|WARNING)\]\s+(.+?\.(?:java|kt|kts|groovy|scala)):\[(\d+),(\d+)\]\s*(?:(error|warning):)?\s*(.+)",
    )
    .expect("constant regex pattern is valid")
});

/// `src/App.java:12: error: cannot find symbol`
#[allow(clippy::expect_used)]
static PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\[\w+\]\s+)?(.+?\.(?:java|kt|kts|groovy|scala)):(\d+):\s*(?:(error|warning):)?\s*(.+)$",
    )
    .expect("constant regex pattern is valid")
});

const SNIPPET_MAX_LINES: usize = 80;
const SNIPPET_MAX_LINE_CHARS: usize = 420;
const TAIL_LINES: usize = 60;
const SUMMARY_MAX_CHARS: usize = 8000;

/// Output fragments showing the sandbox session itself is broken
const RESET_SIGNATURES: &[&str] = &[
    "no active sandbox",
    "sandbox id mismatch",
    "unexpected end of file",
    "i/o error on post request",
    "command failed",
];

/// Infrastructure failure signatures, checked in order
const ENVIRONMENT_SIGNATURES: &[(&str, &[&str])] = &[
    ("sandbox unavailable", &["no active sandbox"]),
    ("sandbox replaced", &["sandbox id mismatch"]),
    (
        "build tool unavailable",
        &["mvn: not found", "mvn: command not found", "'mvn' is not recognized"],
    ),
    (
        "dependency resolution failed",
        &[
            "could not resolve dependencies",
            "could not transfer artifact",
            "failed to read artifact descriptor",
            "cannot access central",
            "could not find artifact",
        ],
    ),
    (
        "network timeout",
        &["connection timed out", "read timed out", "connect timed out", "sockettimeoutexception"],
    ),
    ("repository access failed", &["not authorized", "access denied", "transfer failed"]),
];

fn severity(label: &str) -> Severity {
    if label.eq_ignore_ascii_case("warning") {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Extract diagnostics from build output, dropping echoed duplicates.
pub fn parse_compiler_errors(output: &str) -> Vec<ParsedError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();
    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        let parsed = if let Some(c) = STRUCTURED.captures(line) {
            let label = c.get(5).or_else(|| c.get(1)).map_or("error", |m| m.as_str());
            ParsedError {
                file: c[2].trim().to_string(),
                line: c[3].parse().unwrap_or(0),
                column: c[4].parse().ok(),
                message: c[6].trim().to_string(),
                severity: severity(label),
            }
        } else if let Some(c) = PLAIN.captures(line) {
            ParsedError {
                file: c[1].trim().to_string(),
                line: c[2].parse().unwrap_or(0),
                column: None,
                message: c[4].trim().to_string(),
                severity: severity(c.get(3).map_or("error", |m| m.as_str())),
            }
        } else {
            continue;
        };
        if seen.insert(parsed.dedup_key()) {
            errors.push(parsed);
        }
    }
    errors
}

/// Line of `output` containing `needle` (case-insensitive), bounded
fn matching_line(output: &str, needle: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.to_lowercase().contains(needle))
        .map(|l| truncate_chars(l, SNIPPET_MAX_LINE_CHARS))
}

/// Reason string when `output` looks like an infrastructure failure.
///
/// The reason names the failure category followed by the output line that
/// matched.
pub fn detect_environment_error(output: &str) -> Option<String> {
    let normalized = output.to_lowercase();
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("command failed") {
        return Some("sandbox command failed without build output".to_string());
    }
    for (category, needles) in ENVIRONMENT_SIGNATURES {
        if let Some(needle) = needles.iter().find(|n| normalized.contains(**n)) {
            return Some(match matching_line(output, needle) {
                Some(line) => format!("{category}: {line}"),
                None => category.to_string(),
            });
        }
    }
    if normalized.contains("sandbox") && normalized.contains("timeout") {
        return Some("sandbox timed out".to_string());
    }
    if normalized.contains("build failure")
        && !normalized.contains(".java:")
        && !normalized.contains("error:")
    {
        return Some("build failed without compiler errors".to_string());
    }
    None
}

fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.to_string(),
        (_, true) => stdout.to_string(),
        _ => format!("{stdout}\n{stderr}"),
    }
}

/// Classify a finished build command.
///
/// Exit 0 with a Maven failure banner still counts as failed. Any parsed
/// error-severity diagnostic makes the failure a code error; otherwise an
/// infrastructure signature, a timeout or empty output make it an
/// environment error, which carries no parsed diagnostics.
pub fn classify(exec: &ExecOutput, provider: &str) -> BuildResult {
    let combined = combine(&exec.stdout, &exec.stderr);
    let mut exit_code = exec.exit_code;
    if exit_code == 0
        && (combined.contains("BUILD FAILURE") || combined.contains("Failed to execute goal"))
    {
        exit_code = 1;
    }

    let mut result = BuildResult {
        success: exit_code == 0,
        exit_code,
        stdout: exec.stdout.clone(),
        stderr: exec.stderr.clone(),
        duration_ms: exec.duration_ms,
        parsed_errors: parse_compiler_errors(&combined),
        error_class: ErrorClass::None,
        environment_reason: None,
        provider: provider.to_string(),
    };
    if result.success {
        return result;
    }

    if result.error_count() > 0 {
        result.error_class = ErrorClass::CodeError;
        return result;
    }

    let reason = detect_environment_error(&combined)
        .or_else(|| (exit_code == TIMEOUT_EXIT_CODE).then(|| "build timed out".to_string()))
        .or_else(|| combined.trim().is_empty().then(|| "build failed with no output".to_string()));
    match reason {
        Some(reason) => {
            result.error_class = ErrorClass::EnvironmentError;
            result.environment_reason = Some(reason);
            result.parsed_errors.clear();
        }
        None => result.error_class = ErrorClass::Unknown,
    }
    result
}

/// Environment failure for a provider call that never produced build output
pub fn environment_failure(
    reason: impl Into<String>,
    detail: impl Into<String>,
    provider: &str,
) -> BuildResult {
    BuildResult {
        success: false,
        exit_code: -1,
        stdout: String::new(),
        stderr: detail.into(),
        duration_ms: 0,
        parsed_errors: Vec::new(),
        error_class: ErrorClass::EnvironmentError,
        environment_reason: Some(reason.into()),
        provider: provider.to_string(),
    }
}

/// True when an environment failure points at a corrupt session rather
/// than a slow network, so the session should be recreated before retrying.
pub fn should_reset_session(result: &BuildResult) -> bool {
    if !result.is_environment_error() {
        return false;
    }
    let text = format!(
        "{}\n{}",
        result.environment_reason.as_deref().unwrap_or_default(),
        result.combined_output()
    )
    .to_lowercase();
    RESET_SIGNATURES.iter().any(|s| text.contains(s))
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

fn non_empty_lines(output: &str) -> Vec<&str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

fn tail<'a>(lines: &[&'a str], n: usize) -> Vec<&'a str> {
    lines[lines.len().saturating_sub(n)..].to_vec()
}

/// Operator-facing excerpt of a failed build.
///
/// `[ERROR]` lines when present, else the last lines of output; at most
/// 80 lines of at most 420 characters, with a trailing count of omitted
/// lines.
pub fn failure_snippet(output: &str) -> Vec<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return vec!["build output was empty".to_string()];
    }
    if trimmed.to_lowercase().starts_with("command failed") {
        return vec!["Command failed (provider returned no build output)".to_string()];
    }

    let lines = non_empty_lines(output);
    let errors: Vec<&str> = lines.iter().copied().filter(|l| l.starts_with("[ERROR]")).collect();
    let chosen = if errors.is_empty() { tail(&lines, TAIL_LINES) } else { errors };

    let mut snippet: Vec<String> = chosen
        .iter()
        .take(SNIPPET_MAX_LINES)
        .map(|l| truncate_chars(l, SNIPPET_MAX_LINE_CHARS))
        .collect();
    if chosen.len() > SNIPPET_MAX_LINES {
        snippet.push(format!("… {} more lines", chosen.len() - SNIPPET_MAX_LINES));
    }
    snippet
}

/// Bounded failure summary stored with the validation result and attached
/// to blamed artifacts.
pub fn build_failure_summary(output: &str) -> String {
    let lines = non_empty_lines(output);
    if lines.is_empty() {
        return "build failed (no output)".to_string();
    }
    let marked: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| {
            l.starts_with("[ERROR]")
                || l.contains("BUILD FAILURE")
                || l.contains("Failed to execute goal")
        })
        .take(SNIPPET_MAX_LINES)
        .collect();
    let chosen = if marked.is_empty() { tail(&lines, TAIL_LINES) } else { marked };

    let mut summary = chosen.join("\n");
    summary.push('\n');
    if summary.chars().count() > SUMMARY_MAX_CHARS {
        summary = summary.chars().take(SUMMARY_MAX_CHARS).collect();
        summary.push_str("\n... (truncated)");
    }
    summary
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
