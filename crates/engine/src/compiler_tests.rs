// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const MAVEN_FAILURE: &str = "\
[INFO] Compiling 3 source files
[ERROR] COMPILATION ERROR :
[ERROR] /home/user/app/src/main/java/com/demo/UserService.java:[14,9] cannot find symbol
[ERROR] /home/user/app/src/main/java/com/demo/UserService.java:[20,1] error: ';' expected
[WARNING] /home/user/app/src/main/java/com/demo/User.java:[3,8] unchecked conversion
[INFO] BUILD FAILURE
[ERROR] Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin:3.11.0:compile
[ERROR] /home/user/app/src/main/java/com/demo/UserService.java:[14,9] cannot find symbol
";

fn exec(exit_code: i32, stdout: &str) -> ExecOutput {
    ExecOutput { exit_code, stdout: stdout.to_string(), ..Default::default() }
}

#[test]
fn parses_structured_lines_and_drops_echoes() {
    let errors = parse_compiler_errors(MAVEN_FAILURE);

    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].file, "/home/user/app/src/main/java/com/demo/UserService.java");
    assert_eq!((errors[0].line, errors[0].column), (14, Some(9)));
    assert_eq!(errors[0].message, "cannot find symbol");
    assert_eq!(errors[1].message, "';' expected");
    assert_eq!(errors[2].severity, Severity::Warning);
}

#[test]
fn parses_plain_javac_lines() {
    let errors = parse_compiler_errors(
        "src/App.java:7: error: incompatible types\r\nsrc/App.java:9: warning: deprecated\n",
    );
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].file, "src/App.java");
    assert_eq!(errors[0].line, 7);
    assert_eq!(errors[0].column, None);
    assert_eq!(errors[0].message, "incompatible types");
    assert_eq!(errors[1].severity, Severity::Warning);
}

#[test]
fn windows_paths_parse() {
    let errors = parse_compiler_errors(r"[ERROR] C:\work\app\src\Main.java:[3,14] class expected");
    assert_eq!(errors[0].file, r"C:\work\app\src\Main.java");
}

#[test]
fn stack_traces_are_not_errors() {
    assert!(parse_compiler_errors("\tat com.demo.App.main(App.java:42)\n").is_empty());
}

#[test]
fn classify_success() {
    let result = classify(&exec(0, "[INFO] BUILD SUCCESS"), "remote");
    assert!(result.success);
    assert_eq!(result.error_class, ErrorClass::None);
    assert_eq!(result.provider, "remote");
}

#[test]
fn classify_code_error() {
    let result = classify(&exec(1, MAVEN_FAILURE), "remote");
    assert!(!result.success);
    assert_eq!(result.error_class, ErrorClass::CodeError);
    assert_eq!(result.error_count(), 2);
}

#[test]
fn zero_exit_with_failure_banner_is_a_failure() {
    let result = classify(&exec(0, MAVEN_FAILURE), "remote");
    assert!(!result.success);
    assert_eq!(result.exit_code, 1);
}

#[test]
fn dependency_failure_is_environment_error_with_phrase() {
    let output = "[INFO] BUILD FAILURE\n[ERROR] Failed to execute goal on project demo: \
                  Could not resolve dependencies for project com.demo:demo:jar:1.0";
    let result = classify(&exec(1, output), "remote");

    assert_eq!(result.error_class, ErrorClass::EnvironmentError);
    assert!(result.parsed_errors.is_empty());
    let reason = result.environment_reason.unwrap();
    assert!(reason.contains("Could not resolve dependencies"), "{reason}");
}

#[test]
fn environment_error_drops_warnings() {
    let output = "[WARNING] /src/A.java:[1,1] deprecated\nCould not transfer artifact x from central";
    let result = classify(&exec(1, output), "local");
    assert_eq!(result.error_class, ErrorClass::EnvironmentError);
    assert!(result.parsed_errors.is_empty());
}

#[test]
fn compiler_errors_win_over_environment_signatures() {
    let output = format!("{MAVEN_FAILURE}\nread timed out");
    assert_eq!(classify(&exec(1, &output), "remote").error_class, ErrorClass::CodeError);
}

#[test]
fn timeout_and_empty_output_are_environment_errors() {
    let timed_out = classify(&exec(TIMEOUT_EXIT_CODE, "still compiling"), "local");
    assert_eq!(timed_out.environment_reason.as_deref(), Some("build timed out"));

    let empty = classify(&exec(2, ""), "local");
    assert_eq!(empty.environment_reason.as_deref(), Some("build failed with no output"));
}

#[test]
fn unrecognised_failure_is_unknown() {
    let result = classify(&exec(1, "[ERROR] something odd happened: error: bad config"), "remote");
    assert_eq!(result.error_class, ErrorClass::Unknown);
    assert!(result.environment_reason.is_none());
}

#[parameterized(
    command_failed = { "Command failed", "sandbox command failed" },
    no_sandbox = { "Error: No active sandbox", "sandbox unavailable" },
    mismatch = { "Sandbox ID mismatch: a vs b", "sandbox replaced" },
    no_maven = { "sh: 1: mvn: not found", "build tool unavailable" },
    network = { "java.net.SocketTimeoutException: Read timed out", "network timeout" },
    sandbox_timeout = { "sandbox execution timeout after 300s", "sandbox timed out" },
    auth = { "status code: 401, reason phrase: Not Authorized", "repository access failed" },
    bare_failure = { "[INFO] BUILD FAILURE", "build failed without compiler errors" },
)]
fn environment_signatures(output: &str, category: &str) {
    let reason = detect_environment_error(output).unwrap();
    assert!(reason.starts_with(category), "{reason}");
}

#[test]
fn no_environment_signature_for_code_output() {
    assert_eq!(detect_environment_error(MAVEN_FAILURE), None);
    assert_eq!(detect_environment_error(""), None);
}

#[parameterized(
    no_session = { "no active sandbox", true },
    mismatch = { "sandbox id mismatch", true },
    http_io = { "i/o error on POST request to /api/sandbox/execute: reset", true },
    command_failed = { "command failed: spawn", true },
    slow_network = { "Read timed out", false },
)]
fn reset_only_for_corrupt_sessions(detail: &str, reset: bool) {
    let result = environment_failure("provider call failed", detail, "remote");
    assert_eq!(should_reset_session(&result), reset);
}

#[test]
fn code_errors_never_reset() {
    let result = classify(&exec(1, MAVEN_FAILURE), "remote");
    assert!(!should_reset_session(&result));
}

#[test]
fn snippet_prefers_error_lines() {
    let snippet = failure_snippet(MAVEN_FAILURE);
    assert!(snippet.iter().all(|l| l.starts_with("[ERROR]")));
    assert_eq!(snippet.len(), 5);
}

#[test]
fn snippet_bounds_lines_and_width() {
    let long = format!("[ERROR] {}", "x".repeat(1000));
    let output = std::iter::repeat(long).take(100).collect::<Vec<_>>().join("\n");
    let snippet = failure_snippet(&output);

    assert_eq!(snippet.len(), 81);
    assert_eq!(snippet[0].chars().count(), 423);
    assert_eq!(snippet[80], "… 20 more lines");
}

#[test]
fn snippet_without_errors_uses_tail() {
    let output: String = (0..100).map(|i| format!("line {i}\n")).collect();
    let snippet = failure_snippet(&output);
    assert_eq!(snippet.len(), 60);
    assert_eq!(snippet[0], "line 40");
}

#[parameterized(
    empty = { "", "build output was empty" },
    low_information = { "Command failed\n", "Command failed (provider returned no build output)" },
)]
fn snippet_special_cases(output: &str, expected: &str) {
    assert_eq!(failure_snippet(output), vec![expected.to_string()]);
}

#[test]
fn summary_keeps_failure_lines() {
    let summary = build_failure_summary(MAVEN_FAILURE);
    assert!(summary.contains("BUILD FAILURE"));
    assert!(summary.contains("Failed to execute goal"));
    assert!(!summary.contains("Compiling 3 source files"));
}

#[test]
fn summary_is_bounded() {
    let output: String = (0..80).map(|_| format!("[ERROR] {}\n", "y".repeat(200))).collect();
    let summary = build_failure_summary(&output);
    assert!(summary.ends_with("... (truncated)"));
    assert!(summary.chars().count() <= 8000 + "\n... (truncated)".len());
    assert_eq!(build_failure_summary("  \n"), "build failed (no output)");
}
