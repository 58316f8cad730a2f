// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-phase validation: compile, then compliance, then static analysis.
//!
//! Sequential mode is fail-fast: a later phase runs only when every earlier
//! phase passed or was skipped. Parallel mode dispatches all enabled phases
//! at once and joins them; the composite result still reports the first
//! failing phase in phase order.

use crate::compiler::build_failure_summary;
use crate::compliance::ComplianceChecker;
use crate::hooks::mask::truncate_output;
use crate::log_stream::JobLogSink;
use crate::sandbox::SandboxService;
use crate::static_analysis::StaticAnalyzer;
use mend_adapters::{SandboxAdapter, SandboxError};
use mend_core::{
    Artifact, BuildResult, Clock, ErrorClass, Job, LogEntry, LogRole, ParsedError, PhaseOutcome,
    Severity, ValidationConfig, ValidationPhase, ValidationResult,
};
use std::sync::Arc;
use std::time::Instant;

const SUCCESS_OUTPUT_LINES: usize = 60;
const SUCCESS_OUTPUT_CHARS: usize = 8000;

/// Outcome of one validation round
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub result: ValidationResult,
    pub build: BuildResult,
    /// The validated artifacts, with `error` set on those blamed for a
    /// compile failure and cleared everywhere else
    pub artifacts: Vec<Artifact>,
}

pub struct ValidationPipeline<S: SandboxAdapter, C: Clock> {
    sandbox: Arc<SandboxService<S, C>>,
    compliance: Option<Arc<dyn ComplianceChecker>>,
    analyzer: StaticAnalyzer,
    config: ValidationConfig,
    clock: C,
}

impl<S: SandboxAdapter, C: Clock> ValidationPipeline<S, C> {
    pub fn new(sandbox: Arc<SandboxService<S, C>>, config: ValidationConfig, clock: C) -> Self {
        Self { sandbox, compliance: None, analyzer: StaticAnalyzer::new(), config, clock }
    }

    pub fn with_compliance(mut self, checker: Arc<dyn ComplianceChecker>) -> Self {
        self.compliance = Some(checker);
        self
    }

    pub fn sandbox(&self) -> &Arc<SandboxService<S, C>> {
        &self.sandbox
    }

    /// Validate `artifacts` for `job` at its current round.
    ///
    /// `Err` only for policy blocks and shutdown from the build.
    pub async fn validate(
        &self,
        job: &Job,
        artifacts: &[Artifact],
        log: &dyn JobLogSink,
    ) -> Result<ValidationReport, SandboxError> {
        let start = Instant::now();
        log.emit(
            &job.id,
            LogEntry::info(
                LogRole::Validator,
                format!("validating round {} ({} files)", job.current_round, artifacts.len()),
            ),
        );

        let (build, compile, compliance, analysis) = if self.config.parallel {
            let (compiled, compliance, analysis) = futures_util::future::join3(
                self.compile_phase(job, artifacts, log),
                self.compliance_phase(job, artifacts, log),
                async { self.static_phase(job, artifacts, log) },
            )
            .await;
            let (build, compile) = compiled?;
            (build, compile, compliance, analysis)
        } else {
            let (build, compile) = self.compile_phase(job, artifacts, log).await?;
            let compliance = if compile.passed {
                self.compliance_phase(job, artifacts, log).await
            } else {
                PhaseOutcome::skipped(ValidationPhase::Compliance, "compile failed")
            };
            let analysis = if !compile.passed {
                PhaseOutcome::skipped(ValidationPhase::StaticAnalysis, "compile failed")
            } else if !compliance.passed {
                PhaseOutcome::skipped(ValidationPhase::StaticAnalysis, "compliance failed")
            } else {
                self.static_phase(job, artifacts, log)
            };
            (build, compile, compliance, analysis)
        };

        let phases = vec![compile, compliance, analysis];
        let failed = phases.iter().find(|p| !p.passed);
        let combined = build.combined_output();
        let output = if build.success {
            truncate_output(&combined, SUCCESS_OUTPUT_LINES, SUCCESS_OUTPUT_CHARS)
        } else {
            build_failure_summary(&combined)
        };
        let result = ValidationResult {
            job_id: job.id,
            round: job.current_round,
            passed: failed.is_none(),
            failed_phase: failed.map(|p| p.phase),
            detail: failed.map(|p| p.detail.clone()).unwrap_or_default(),
            parsed_errors: build.parsed_errors.clone(),
            error_class: build.error_class,
            environment_reason: build.environment_reason.clone(),
            exit_code: build.exit_code,
            output,
            duration_ms: start.elapsed().as_millis() as u64,
            phases,
            created_at_ms: self.clock.epoch_ms(),
        };

        tracing::info!(
            job_id = %job.id,
            round = result.round,
            passed = result.passed,
            failed_phase = ?result.failed_phase,
            errors = result.error_count(),
            elapsed_ms = result.duration_ms,
            "validation finished"
        );
        if result.passed {
            log.emit(
                &job.id,
                LogEntry::success(
                    LogRole::Validator,
                    format!("validation passed (round {})", result.round),
                ),
            );
        }

        let artifacts = mark_artifact_errors(artifacts, &build);
        Ok(ValidationReport { result, build, artifacts })
    }

    async fn compile_phase(
        &self,
        job: &Job,
        artifacts: &[Artifact],
        log: &dyn JobLogSink,
    ) -> Result<(BuildResult, PhaseOutcome), SandboxError> {
        let build = self.sandbox.compile(job, artifacts, log).await?;
        let detail = if build.success {
            format!("compiled on {} in {} ms", build.provider, build.duration_ms)
        } else if let Some(reason) = &build.environment_reason {
            format!("environment error: {reason}")
        } else {
            build_failure_summary(&build.combined_output())
        };
        if !build.success {
            log.emit(
                &job.id,
                LogEntry::warn(
                    LogRole::Validator,
                    format!(
                        "compile validation failed: {} errors (exit {}, {})",
                        build.error_count(),
                        build.exit_code,
                        build.error_class
                    ),
                ),
            );
        }
        let outcome = PhaseOutcome {
            phase: ValidationPhase::Compile,
            passed: build.success,
            skipped: false,
            detail,
            findings: build
                .parsed_errors
                .iter()
                .filter(|e| e.severity == Severity::Error)
                .map(format_error)
                .collect(),
            duration_ms: build.duration_ms,
        };
        Ok((build, outcome))
    }

    async fn compliance_phase(
        &self,
        job: &Job,
        artifacts: &[Artifact],
        log: &dyn JobLogSink,
    ) -> PhaseOutcome {
        let checker = match &self.compliance {
            Some(checker) if self.config.compliance_enabled => checker,
            Some(_) => return PhaseOutcome::skipped(ValidationPhase::Compliance, "disabled"),
            None => {
                return PhaseOutcome::skipped(ValidationPhase::Compliance, "no checker configured")
            }
        };
        let start = Instant::now();
        let violations = checker.check(job, artifacts).await;
        findings_outcome(
            job,
            ValidationPhase::Compliance,
            &format!("{} compliance", checker.name()),
            violations,
            start,
            log,
        )
    }

    fn static_phase(&self, job: &Job, artifacts: &[Artifact], log: &dyn JobLogSink) -> PhaseOutcome {
        if !self.config.static_analysis_enabled {
            return PhaseOutcome::skipped(ValidationPhase::StaticAnalysis, "disabled");
        }
        let start = Instant::now();
        let violations = self.analyzer.analyze(artifacts);
        findings_outcome(job, ValidationPhase::StaticAnalysis, "static analysis", violations, start, log)
    }
}

fn findings_outcome(
    job: &Job,
    phase: ValidationPhase,
    label: &str,
    findings: Vec<String>,
    start: Instant,
    log: &dyn JobLogSink,
) -> PhaseOutcome {
    let passed = findings.is_empty();
    let detail = if passed {
        format!("{label} passed")
    } else {
        log.emit(
            &job.id,
            LogEntry::error(
                LogRole::Validator,
                format!("{label} found {} issues", findings.len()),
            ),
        );
        for finding in &findings {
            log.emit(&job.id, LogEntry::warn(LogRole::Validator, finding.clone()));
        }
        format!("{label} found {} issues: {}", findings.len(), findings.join("; "))
    };
    PhaseOutcome {
        phase,
        passed,
        skipped: false,
        detail,
        findings,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn format_error(error: &ParsedError) -> String {
    format!(
        "{}:{}:{}: {}: {}",
        error.file,
        error.line,
        error.column.unwrap_or(0),
        error.severity,
        error.message
    )
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `error_file` names the artifact at `artifact_path`, allowing any prefix
/// such as the sandbox working directory
fn path_matches(error_file: &str, artifact_path: &str) -> bool {
    let path = normalize_path(artifact_path);
    !path.is_empty() && (error_file == path || error_file.ends_with(&format!("/{path}")))
}

/// Attach compile errors to the artifacts they belong to.
///
/// Each error-severity diagnostic blames artifacts whose path is a suffix of
/// the reported file, or failing that, artifacts with the same file name.
/// A failed build that blames nothing falls back to the `pom.xml` build
/// descriptor, annotated with the environment reason or the failure
/// summary. Errors from earlier rounds are cleared.
pub fn mark_artifact_errors(artifacts: &[Artifact], build: &BuildResult) -> Vec<Artifact> {
    let mut marked: Vec<Artifact> = artifacts
        .iter()
        .cloned()
        .map(|mut a| {
            a.error = None;
            a
        })
        .collect();
    if build.success {
        return marked;
    }

    let mut blamed: Vec<Vec<String>> = vec![Vec::new(); marked.len()];
    for error in build.parsed_errors.iter().filter(|e| e.severity == Severity::Error) {
        let file = normalize_path(&error.file);
        let mut hits: Vec<usize> = marked
            .iter()
            .enumerate()
            .filter(|(_, a)| path_matches(&file, &a.path))
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            hits = marked
                .iter()
                .enumerate()
                .filter(|(_, a)| a.file_name() == file_name(&file))
                .map(|(i, _)| i)
                .collect();
        }
        for i in hits {
            blamed[i].push(format_error(error));
        }
    }
    for (artifact, lines) in marked.iter_mut().zip(blamed) {
        if !lines.is_empty() {
            artifact.error = Some(lines.join("\n"));
        }
    }

    if !marked.iter().any(Artifact::has_errors) {
        if let Some(pom) = marked.iter_mut().find(|a| a.file_name() == "pom.xml") {
            let summary = match (&build.error_class, &build.environment_reason) {
                (ErrorClass::EnvironmentError, Some(reason)) => reason.clone(),
                _ => build_failure_summary(&build.combined_output()),
            };
            pom.error = Some(summary);
        }
    }
    marked
}

/// Artifacts currently blamed for a failure, in working-set order
pub fn failing_artifacts(artifacts: &[Artifact]) -> Vec<Artifact> {
    artifacts.iter().filter(|a| a.has_errors()).cloned().collect()
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
