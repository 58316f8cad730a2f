// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain compliance checks run after a clean compile.

use crate::graph::build_graph;
use async_trait::async_trait;
use mend_core::{pascal_case, Artifact, Job};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@TableName\(\s*(?:value\s*=\s*)?"([^"]+)""#)
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static CLASS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+([A-Z]\w*)").expect("constant regex pattern is valid")
});

/// Checks generated artifacts against the job's locked contract.
///
/// Returns one message per violation; empty means compliant.
#[async_trait]
pub trait ComplianceChecker: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, job: &Job, artifacts: &[Artifact]) -> Vec<String>;
}

/// Every table in the contract schema needs an entity class.
///
/// An entity maps a table through `@TableName("t")`, or by being named
/// after it (`order_items` -> `OrderItems` or `OrderItem`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCompliance;

impl SchemaCompliance {
    fn maps_table(artifact: &Artifact, table: &str) -> bool {
        if let Some(caps) = TABLE_NAME.captures(&artifact.content) {
            return caps[1].eq_ignore_ascii_case(table);
        }
        let plural = pascal_case(table);
        let singular = plural.strip_suffix('s').unwrap_or(&plural);
        CLASS_NAME
            .captures_iter(&artifact.content)
            .any(|caps| &caps[1] == plural.as_str() || &caps[1] == singular)
    }
}

#[async_trait]
impl ComplianceChecker for SchemaCompliance {
    fn name(&self) -> &str {
        "schema"
    }

    async fn check(&self, job: &Job, artifacts: &[Artifact]) -> Vec<String> {
        let Some(contract) = job.contract() else {
            return Vec::new();
        };
        let tables = build_graph(&contract.schema_text).tables;
        if tables.is_empty() {
            return Vec::new();
        }
        if artifacts.is_empty() {
            return vec!["no artifacts to check against the schema".to_string()];
        }

        let sources: Vec<&Artifact> =
            artifacts.iter().filter(|a| a.file_name().ends_with(".java")).collect();
        tables
            .iter()
            .filter(|table| !sources.iter().any(|a| Self::maps_table(a, table)))
            .map(|table| format!("missing entity for table {table}"))
            .collect()
    }
}

#[cfg(test)]
#[path = "compliance_tests.rs"]
mod tests;
