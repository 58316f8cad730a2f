// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build results, parsed compiler errors and per-round validation records.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

crate::simple_display! {
    Severity {
        Error => "error",
        Warning => "warning",
    }
}

/// One compiler diagnostic extracted from build output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedError {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub message: String,
    pub severity: Severity,
}

impl ParsedError {
    /// Composite key used to drop echoed duplicates
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.file,
            self.line,
            self.column.map(|c| c.to_string()).unwrap_or_default(),
            self.severity,
            self.message
        )
    }
}

/// How a build outcome should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Build succeeded
    #[default]
    None,
    /// Generated code is wrong; hand to repair, never retry in place
    CodeError,
    /// Infrastructure failure; retry, reset or fall back
    EnvironmentError,
    /// Failed without a recognisable cause; treated like a code error
    Unknown,
}

crate::simple_display! {
    ErrorClass {
        None => "none",
        CodeError => "code_error",
        EnvironmentError => "environment_error",
        Unknown => "unknown",
    }
}

/// Classified outcome of one build attempt
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub parsed_errors: Vec<ParsedError>,
    pub error_class: ErrorClass,
    /// Matched infrastructure signature when `error_class` is `EnvironmentError`
    pub environment_reason: Option<String>,
    /// Provider that produced the result (`remote`, `local`, ...)
    pub provider: String,
}

impl BuildResult {
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    pub fn error_count(&self) -> usize {
        self.parsed_errors.iter().filter(|e| e.severity == Severity::Error).count()
    }

    pub fn is_environment_error(&self) -> bool {
        self.error_class == ErrorClass::EnvironmentError
    }
}

/// Pipeline phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPhase {
    Compile,
    Compliance,
    StaticAnalysis,
}

crate::simple_display! {
    ValidationPhase {
        Compile => "compile",
        Compliance => "compliance",
        StaticAnalysis => "static_analysis",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: ValidationPhase,
    pub passed: bool,
    pub skipped: bool,
    pub detail: String,
    pub findings: Vec<String>,
    pub duration_ms: u64,
}

impl PhaseOutcome {
    pub fn skipped(phase: ValidationPhase, reason: impl Into<String>) -> Self {
        Self {
            phase,
            passed: true,
            skipped: true,
            detail: reason.into(),
            findings: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Record of one validation round. Append-only: produced once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub job_id: JobId,
    pub round: u32,
    pub passed: bool,
    pub failed_phase: Option<ValidationPhase>,
    /// Detail of the first failing phase, surfaced to repair
    pub detail: String,
    pub parsed_errors: Vec<ParsedError>,
    pub error_class: ErrorClass,
    pub environment_reason: Option<String>,
    pub exit_code: i32,
    /// Bounded build output summary
    pub output: String,
    pub duration_ms: u64,
    pub phases: Vec<PhaseOutcome>,
    pub created_at_ms: u64,
}

impl ValidationResult {
    pub fn compile_passed(&self) -> bool {
        self.phases.iter().any(|p| p.phase == ValidationPhase::Compile && p.passed)
    }

    pub fn error_count(&self) -> usize {
        self.parsed_errors.iter().filter(|e| e.severity == Severity::Error).count()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
