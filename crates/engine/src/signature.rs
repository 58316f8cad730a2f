// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable fingerprints of build failures.
//!
//! Two rounds failing with the same signature means repair made no
//! progress. Line numbers, paths and timestamps are normalized away so that
//! an error moving down a file still matches.

use mend_core::ParsedError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

pub const EMPTY_OUTPUT: &str = "EMPTY_OUTPUT";
pub const NO_PARSED_ERRORS: &str = "NO_PARSED_ERRORS";

const NORMALIZED_OUTPUT_MAX_CHARS: usize = 500;

/// Known failure shapes: `(kind, description, pattern)`. The first capture
/// group, when present, names the offending symbol.
#[allow(clippy::expect_used)]
static PATTERNS: LazyLock<Vec<(&'static str, &'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "SYMBOL_NOT_FOUND",
            "symbol not found",
            r"(?is)cannot find symbol.*?symbol:\s*(?:class|variable|method)\s+(\w+)",
        ),
        ("INCOMPATIBLE_TYPES", "incompatible types", r"(?i)incompatible types:.*?(?:required|found):\s*(\S+)"),
        ("PACKAGE_NOT_EXIST", "package does not exist", r"(?i)package\s+(\S+)\s+does not exist"),
        ("METHOD_NOT_APPLICABLE", "method arguments mismatch", r"(?i)method\s+(\w+).*?cannot be applied"),
        ("UNREPORTED_EXCEPTION", "unhandled exception", r"(?i)unreported exception\s+(\S+)"),
        ("MISSING_RETURN", "missing return statement", r"(?i)missing return statement"),
        ("SYNTAX_ERROR", "syntax error", r"(?i)(';'|'\)'|'\{'|'\}')\s*expected"),
        ("ILLEGAL_START", "illegal start of expression", r"(?i)illegal start of (expression|type)"),
        (
            "DEPENDENCY_RESOLVE",
            "dependency resolution failed",
            r"(?is)could not resolve dependencies.*?artifact\s+(\S+)",
        ),
        ("ARTIFACT_NOT_FOUND", "artifact not found", r"(?i)could not find artifact\s+(\S+)"),
        ("PARENT_POM_ERROR", "parent POM unresolvable", r"(?i)non-resolvable parent pom"),
        ("PLUGIN_ERROR", "plugin execution failed", r"(?i)failed to execute goal\s+(\S+)"),
    ]
    .into_iter()
    .map(|(kind, description, pattern)| {
        (kind, description, Regex::new(pattern).expect("constant regex pattern is valid"))
    })
    .collect()
});

#[allow(clippy::expect_used)]
static POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+,\d+\]").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+:").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static SOURCE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[a-zA-Z0-9_/.-]+/([A-Z][a-zA-Z0-9]+\.java)").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static GENERICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("constant regex pattern is valid"));

/// First 8 bytes of SHA-256, hex encoded
fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Signature of parsed diagnostics, or [`NO_PARSED_ERRORS`].
///
/// Each error contributes `file-name:message` with positions stripped; the
/// parts are sorted so diagnostic order does not matter.
pub fn from_parsed(errors: &[ParsedError]) -> String {
    if errors.is_empty() {
        return NO_PARSED_ERRORS.to_string();
    }
    let mut parts: Vec<String> = errors.iter().map(normalize_error).collect();
    parts.sort();
    hash_text(&parts.join("|"))
}

/// Signature of raw build output.
///
/// Recognized error shapes are hashed when any match; otherwise the
/// normalized output is hashed under an `UNKNOWN_` prefix.
pub fn from_output(output: &str) -> String {
    if output.trim().is_empty() {
        return EMPTY_OUTPUT.to_string();
    }
    let mut extracted = extract_errors(output);
    if extracted.is_empty() {
        return format!("UNKNOWN_{}", hash_text(&normalize_output(output)));
    }
    extracted.sort();
    hash_text(&extracted.join("|"))
}

/// Parsed diagnostics take precedence over raw output
pub fn error_signature(errors: &[ParsedError], output: &str) -> String {
    match from_parsed(errors) {
        sig if sig == NO_PARSED_ERRORS => from_output(output),
        sig => sig,
    }
}

/// Human-readable name of the first recognized failure shape
pub fn error_type_description(output: &str) -> &'static str {
    if output.trim().is_empty() {
        return "unknown error";
    }
    PATTERNS
        .iter()
        .find(|(_, _, re)| re.is_match(output))
        .map_or("other compilation error", |(_, description, _)| description)
}

fn extract_errors(output: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (kind, _, re) in PATTERNS.iter() {
        for caps in re.captures_iter(output) {
            let entry = match caps.get(1) {
                Some(symbol) => format!("{kind}:{}", normalize_symbol(symbol.as_str())),
                None => kind.to_string(),
            };
            if !found.contains(&entry) {
                found.push(entry);
            }
        }
    }
    found
}

/// Drop generic arguments and package qualifiers, lowercase
fn normalize_symbol(symbol: &str) -> String {
    let bare = GENERICS.replace_all(symbol, "");
    let simple = bare.rsplit('.').next().unwrap_or(&bare);
    simple.trim().to_lowercase()
}

fn normalize_error(error: &ParsedError) -> String {
    let file = error.file.rsplit('/').next().unwrap_or(&error.file);
    let message = error.message.to_lowercase();
    let message = POSITION.replace_all(&message, "");
    let message = LINE_NUMBER.replace_all(&message, ":");
    format!("{file}:{}", message.trim())
}

fn normalize_output(output: &str) -> String {
    let text = TIMESTAMP.replace_all(output, "");
    let text = LINE_NUMBER.replace_all(&text, ":");
    let text = POSITION.replace_all(&text, "");
    let text = SOURCE_PATH.replace_all(&text, "$1");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(NORMALIZED_OUTPUT_MAX_CHARS).collect()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
