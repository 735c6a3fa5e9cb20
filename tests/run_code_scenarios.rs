//! End-to-end scenarios through the public API on the local backend.
//!
//! Tests that execute code return early when `python3` is not on PATH.

use runbox::{
    ErrorKind, ExecutionRequest, ExecutionResult, ExecutionStatus, ResultFormatter, SandboxConfig,
    SandboxContext, SandboxFactory, SecurityChecker, classify, execute_once, run_code_with,
    smart_truncate, truncate_output,
};
use std::sync::Arc;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn config(dir: &tempfile::TempDir) -> Arc<SandboxConfig> {
    Arc::new(SandboxConfig {
        temp_dir: dir.path().join("runs"),
        ..Default::default()
    })
}

async fn run(code: &str, timeout: u64) -> ExecutionResult {
    let dir = tempfile::tempdir().unwrap();
    execute_once(config(&dir), code, "local", timeout)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_hello_succeeds() {
    if !python_available() {
        return;
    }
    let result = run("print('Hello from sandbox!')", 30).await;
    assert_eq!(result.status, ExecutionStatus::Success, "{:?}", result.error);
    assert!(result.output.contains("Hello from sandbox!"));
    assert_eq!(result.exit_code, 0);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_syntax_error_is_classified() {
    if !python_available() {
        return;
    }
    let result = run("print('hello'", 30).await;
    assert_eq!(result.status, ExecutionStatus::Error);
    let error = result.error.as_deref().unwrap();
    assert_eq!(classify(error).kind, ErrorKind::SyntaxError);
}

#[tokio::test]
async fn test_division_by_zero_is_classified() {
    if !python_available() {
        return;
    }
    let result = run("x = 1 / 0", 30).await;
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(classify(result.error.as_deref().unwrap()).kind, ErrorKind::ZeroDivision);

    let json = ResultFormatter::new().to_json(&result).unwrap();
    assert_eq!(json["error_kind"], "zero_division");
}

#[tokio::test]
async fn test_disallowed_import_never_runs() {
    // The rejection happens before any interpreter is needed
    let dir = tempfile::tempdir().unwrap();
    let factory = SandboxFactory::new();
    let config = config(&dir);
    let sandbox = factory
        .create("local", Arc::clone(&config), SandboxContext::new(&config))
        .unwrap();

    let result = sandbox.execute(&ExecutionRequest::new("import subprocess")).await;
    assert_eq!(result.status, ExecutionStatus::SecurityViolation);
    assert!(result.error.unwrap().contains("subprocess"));
    assert_eq!(result.exit_code, -1);
}

#[tokio::test]
async fn test_allowed_import_computes_factorial() {
    if !python_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let text = run_code_with(
        config(&dir),
        "import math\nprint(math.factorial(5))",
        "local",
        10,
    )
    .await;
    assert_eq!(text.trim(), "120");
}

#[tokio::test]
async fn test_trailing_expression_is_returned() {
    if !python_available() {
        return;
    }
    let result = run("values = [1, 2, 3]\nsum(values) * 2", 10).await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.return_value.as_deref(), Some("12"));
}

#[tokio::test]
async fn test_timeout_is_enforced() {
    if !python_available() {
        return;
    }
    let result = run("import time\ntime.sleep(5)", 1).await;
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert!(result.execution_time >= 1.0);
    assert!(result.execution_time < 5.0);
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_unknown_backend_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let text = run_code_with(config(&dir), "print(1)", "firecracker", 5).await;
    assert_eq!(text, "Error: Unknown sandbox backend 'firecracker'");
}

#[test]
fn test_truncation_keeps_bound_and_marker() {
    let text = "x".repeat(50_000);
    let truncated = truncate_output(&text, 10_000);
    assert!(truncated.chars().count() <= 10_000 + 64);
    assert!(truncated.contains("truncated"));

    let short = smart_truncate("short", 100);
    assert_eq!(short.text, "short");
}

#[test]
fn test_sanitize_output_is_idempotent() {
    let checker = SecurityChecker::new(&SandboxConfig::default()).unwrap();
    let raw = format!("api_key=sk-123456 and password: hunter2\n{}", "y".repeat(20_000));
    let once = checker.sanitize_output(&raw);
    assert!(!once.contains("hunter2"));
    assert!(!once.contains("sk-123456"));
    assert_eq!(checker.sanitize_output(&once), once);
}

#[test]
fn test_json_round_trip() {
    let formatter = ResultFormatter::new();
    let result = ExecutionResult::failure(
        runbox::SandboxKind::Local,
        runbox::ExecutionTiming::finish(chrono::Utc::now()),
        ExecutionStatus::Error,
        "NameError: name 'x' is not defined",
    )
    .with_exit_code(1);

    let value = formatter.to_json(&result).unwrap();
    assert_eq!(value["error_kind"], "name_error");
    let back: ExecutionResult = serde_json::from_value(value).unwrap();
    assert_eq!(back.status, result.status);
    assert_eq!(back.error, result.error);
    assert_eq!(back.exit_code, 1);
}
