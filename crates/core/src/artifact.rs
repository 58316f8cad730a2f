// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generated source files and the path-keyed merge used between rounds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A path-addressed unit of generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
    /// Producing agent, e.g. `coder` or `repair`
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub round: u32,
    #[serde(default = "first_version")]
    pub version: u32,
    /// Build error attributed to this file in the latest validation
    #[serde(default)]
    pub error: Option<String>,
}

fn first_version() -> u32 {
    1
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            agent: String::new(),
            round: 0,
            version: 1,
            error: None,
        }
    }

    crate::setters! {
        into { agent: String }
        set { round: u32, version: u32 }
        option { error: String }
    }

    /// Final path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }
}

/// Replace artifacts in `original` whose path appears in `fixes`.
///
/// Order and length of `original` are preserved; fixes for paths not in
/// `original` are ignored. When `fixes` repeats a path the last one wins.
pub fn merge_artifacts(original: &[Artifact], fixes: &[Artifact]) -> Vec<Artifact> {
    let by_path: HashMap<&str, &Artifact> = fixes.iter().map(|a| (a.path.as_str(), a)).collect();
    original
        .iter()
        .map(|a| by_path.get(a.path.as_str()).map_or_else(|| a.clone(), |fix| (*fix).clone()))
        .collect()
}

/// Stamp `fixes` as new revisions of the matching files in `current`:
/// the prior version plus one, produced by `agent` in `round`. Fixes for
/// paths not in `current` are dropped, as [`merge_artifacts`] ignores them.
pub fn next_revisions(
    current: &[Artifact],
    fixes: &[Artifact],
    agent: &str,
    round: u32,
) -> Vec<Artifact> {
    let versions: HashMap<&str, u32> =
        current.iter().map(|a| (a.path.as_str(), a.version)).collect();
    fixes
        .iter()
        .filter_map(|fix| {
            let prior = versions.get(fix.path.as_str())?;
            Some(Artifact {
                agent: agent.to_string(),
                round,
                version: prior + 1,
                error: None,
                ..fix.clone()
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
