// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redaction and truncation for audit payloads.

use regex::Regex;
use std::sync::LazyLock;

pub const TRUNCATED_MARKER: &str = "...(truncated)";

/// Line cap for anything written to an audit sink
pub const AUDIT_MAX_LINES: usize = 20;

#[allow(clippy::expect_used)]
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)(authorization\s*:\s*)([^\n\r]+)", "${1}***"),
        (r"(?i)(bearer\s+)([A-Za-z0-9._~+/=-]+)", "${1}***"),
        (r"sk-[A-Za-z0-9_-]{16,}", "sk-***"),
        (r"(?i)([A-Za-z0-9_]*(?:api[_-]?key|access[_-]?key))\s*[:=]\s*([^\s,;]+)", "${1}=***"),
        (r"(?i)([A-Za-z0-9_]*(?:password|passwd|secret|token))\s*[:=]\s*([^\s,;]+)", "${1}=***"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (Regex::new(pattern).expect("constant regex pattern is valid"), replacement)
    })
    .collect()
});

/// Replace credentials with `***`
pub fn mask_sensitive(text: &str) -> String {
    RULES.iter().fold(text.to_string(), |acc, (re, replacement)| {
        re.replace_all(&acc, *replacement).into_owned()
    })
}

/// Cut `text` to `max_chars`. Zero means unlimited.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(TRUNCATED_MARKER);
    out
}

/// Keep at most `max_lines` lines and `max_chars` characters
pub fn truncate_output(text: &str, max_lines: usize, max_chars: usize) -> String {
    let total = text.lines().count();
    let mut out = if max_lines > 0 && total > max_lines {
        let mut kept = text.lines().take(max_lines).collect::<Vec<_>>().join("\n");
        kept.push_str(&format!("\n... ({} more lines)", total - max_lines));
        kept
    } else {
        text.to_string()
    };
    if max_chars > 0 && out.chars().count() > max_chars {
        out = truncate(&out, max_chars);
    }
    out
}

/// Mask, then bound by [`AUDIT_MAX_LINES`] and `max_chars`, as written to
/// audit sinks
pub fn sanitize(text: &str, max_chars: usize) -> String {
    truncate_output(&mask_sensitive(text), AUDIT_MAX_LINES, max_chars)
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
