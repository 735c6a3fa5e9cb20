//! One-shot execution entry point

use crate::config::{ConfigLoader, SandboxConfig};
use crate::error::SandboxError;
use crate::models::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, ExecutionTiming, SandboxKind,
};
use crate::output::ResultFormatter;
use crate::sandbox::{SandboxContext, SandboxFactory};
use crate::security::SecurityChecker;
use chrono::Utc;
use std::sync::Arc;

/// Run `code` once on `backend` and return its output, or a formatted error.
///
/// Configuration comes from the defaults plus `RUNBOX_*` overrides. The
/// sandbox is created, initialized and cleaned up within the call.
pub async fn run_code(code: &str, backend: &str, timeout_secs: u64) -> String {
    match ConfigLoader::new().with_defaults().with_env().load() {
        Ok(config) => run_code_with(Arc::new(config), code, backend, timeout_secs).await,
        Err(e) => format!("Error: {}", e),
    }
}

/// [`run_code`] with an explicit configuration
pub async fn run_code_with(
    config: Arc<SandboxConfig>,
    code: &str,
    backend: &str,
    timeout_secs: u64,
) -> String {
    match execute_once(config, code, backend, timeout_secs).await {
        Ok(result) => render(&result),
        Err(message) => message,
    }
}

/// Execute once and hand back the full result.
///
/// Code that fails the security check is rejected before any backend is
/// constructed, so a broken interpreter or an absent daemon never masks
/// the violation.
pub async fn execute_once(
    config: Arc<SandboxConfig>,
    code: &str,
    backend: &str,
    timeout_secs: u64,
) -> Result<ExecutionResult, String> {
    let factory = SandboxFactory::new();
    if !factory.supports(backend) {
        return Err(format!("Error: {}", SandboxError::UnknownBackend(backend.to_string())));
    }

    let started_at = Utc::now();
    let checker = SecurityChecker::new(&config).map_err(|e| format!("Error: {}", e))?;
    let report = checker.check(code);
    if !report.safe {
        tracing::warn!(
            backend,
            violations = report.violations.len(),
            "Rejected before sandbox setup"
        );
        return Ok(ExecutionResult::failure(
            kind_of(backend),
            ExecutionTiming::finish(started_at),
            ExecutionStatus::SecurityViolation,
            report.message(),
        ));
    }

    let context = SandboxContext::new(&config);
    let request = ExecutionRequest::new(code).with_timeout(timeout_secs);

    factory
        .scoped(backend, config, context, |sandbox| async move {
            sandbox.execute(&request).await
        })
        .await
        .map_err(|e| format!("Error: {}", e))
}

fn kind_of(backend: &str) -> SandboxKind {
    match backend.to_lowercase().as_str() {
        "container" | "docker" => SandboxKind::Container,
        _ => SandboxKind::Local,
    }
}

fn render(result: &ExecutionResult) -> String {
    if !result.is_success() {
        return ResultFormatter::new().to_text(result);
    }
    match (&result.return_value, result.output.is_empty()) {
        (Some(value), true) => value.clone(),
        (Some(value), false) => format!("{}{}", result.output, value),
        (None, _) => result.output.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_success() {
        let timing = ExecutionTiming::finish(Utc::now());
        let result = ExecutionResult::success(SandboxKind::Local, timing, "120\n");
        assert_eq!(render(&result), "120\n");

        let result = ExecutionResult::success(SandboxKind::Local, timing, "")
            .with_return_value(Some("42".into()));
        assert_eq!(render(&result), "42");
    }

    #[test]
    fn test_render_failure_is_formatted() {
        let timing = ExecutionTiming::finish(Utc::now());
        let result = ExecutionResult::failure(
            SandboxKind::Local,
            timing,
            ExecutionStatus::Error,
            "ZeroDivisionError: division by zero",
        )
        .with_exit_code(1);
        let text = render(&result);
        assert!(text.contains("ERROR"));
        assert!(text.contains("zero_division"));
    }

    #[tokio::test]
    async fn test_unknown_backend_message() {
        let text =
            run_code_with(Arc::new(SandboxConfig::default()), "print(1)", "vm", 5).await;
        assert_eq!(text, "Error: Unknown sandbox backend 'vm'");
    }

    #[tokio::test]
    async fn test_violation_reported_before_backend_setup() {
        let config = SandboxConfig {
            python_executable: "/no/such/python3".into(),
            ..Default::default()
        };
        let config = Arc::new(config);

        let result = execute_once(Arc::clone(&config), "import subprocess", "local", 5)
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::SecurityViolation);
        assert!(result.error.as_deref().unwrap().contains("subprocess"));

        let text = run_code_with(config, "import subprocess", "local", 5).await;
        assert!(text.contains("SECURITY_VIOLATION"), "{}", text);
        assert!(!text.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_container_violation_needs_no_daemon() {
        let result = execute_once(
            Arc::new(SandboxConfig::default()),
            "eval('1 + 1')",
            "docker",
            5,
        )
        .await
        .unwrap();
        assert_eq!(result.status, ExecutionStatus::SecurityViolation);
        assert_eq!(result.sandbox_type, SandboxKind::Container);
    }
}
