// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern rules over generated sources.
//!
//! Not a type checker: each rule looks for a declaration shape and the
//! annotation the framework needs to wire it.

use mend_core::Artifact;
use regex::Regex;
use std::sync::LazyLock;

struct Rule {
    file_suffix: &'static str,
    declaration: Regex,
    annotation: Regex,
    label: &'static str,
}

#[allow(clippy::expect_used)]
fn rule(file_suffix: &'static str, declaration: &str, annotation: &str, label: &'static str) -> Rule {
    Rule {
        file_suffix,
        declaration: Regex::new(declaration).expect("constant regex pattern is valid"),
        annotation: Regex::new(annotation).expect("constant regex pattern is valid"),
        label,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("Mapper.java", r"public\s+interface\s+\w+Mapper\b", r"@Mapper\b", "@Mapper"),
        rule("ServiceImpl.java", r"public\s+class\s+\w+ServiceImpl\b", r"@Service\b", "@Service"),
        rule(
            "Controller.java",
            r"public\s+class\s+\w+Controller\b",
            r"@RestController\b",
            "@RestController",
        ),
    ]
});

/// Runs the built-in rule set
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAnalyzer;

impl StaticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// One message per violation, `[File.java] missing @Annotation annotation`
    pub fn analyze(&self, artifacts: &[Artifact]) -> Vec<String> {
        let mut violations = Vec::new();
        for artifact in artifacts {
            let file_name = artifact.file_name();
            if !file_name.ends_with(".java") {
                continue;
            }
            for rule in RULES.iter() {
                if file_name.ends_with(rule.file_suffix)
                    && rule.declaration.is_match(&artifact.content)
                    && !rule.annotation.is_match(&artifact.content)
                {
                    violations.push(format!("[{file_name}] missing {} annotation", rule.label));
                }
            }
        }
        if !violations.is_empty() {
            tracing::debug!(count = violations.len(), "static analysis violations");
        }
        violations
    }
}

#[cfg(test)]
#[path = "static_analysis_tests.rs"]
mod tests;
