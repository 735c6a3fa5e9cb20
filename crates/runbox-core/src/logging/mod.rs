//! Request/result log entries and the compliance audit trail

mod audit;

pub use audit::{AuditEntry, AuditLog};

use crate::models::{ExecutionRequest, ExecutionResult, SandboxKind};

/// Characters of code included in request log entries
pub const CODE_PREVIEW_CHARS: usize = 100;

/// Emits one `tracing` entry per request and per result
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionLogger;

impl ExecutionLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_request(&self, request: &ExecutionRequest, backend: SandboxKind) {
        tracing::info!(
            target: "runbox::execution",
            backend = %backend,
            code_length = request.code.len(),
            code_preview = %request.code_preview(CODE_PREVIEW_CHARS),
            timeout = request.timeout,
            memory_limit = request.memory_limit,
            "Execution requested"
        );
    }

    pub fn log_result(&self, result: &ExecutionResult) {
        tracing::info!(
            target: "runbox::execution",
            backend = %result.sandbox_type,
            status = %result.status,
            execution_time = result.execution_time,
            memory_used = result.memory_used,
            output_length = result.output.len(),
            exit_code = result.exit_code,
            "Execution finished"
        );
    }
}
