//! Mapping raw process outcomes onto terminal results

use super::harness::SideChannel;
use crate::models::{ExecutionResult, ExecutionStatus, ExecutionTiming, SandboxKind};
use crate::security::{SecurityChecker, redact_secrets};
use std::time::Duration;

/// Exit code the container runtime reports for SIGKILL
pub const SIGKILL_EXIT_CODE: i64 = 137;

const SIGKILL: i32 = 9;
const SIGXCPU: i32 = 24;

/// How the guest process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i64),
    /// Killed by a signal we did not send
    Signaled(i32),
    TimedOut(Duration),
    Cancelled,
}

/// Everything a backend observed about one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub termination: Termination,
    pub stdout: String,
    pub stderr: String,
    pub peak_memory: u64,
}

impl RunOutcome {
    pub fn new(termination: Termination, stdout: String, stderr: String) -> Self {
        Self {
            termination,
            stdout,
            stderr,
            peak_memory: 0,
        }
    }

    pub fn with_peak_memory(mut self, bytes: u64) -> Self {
        self.peak_memory = bytes;
        self
    }
}

/// Build the terminal result for `outcome`
pub fn finalize(
    kind: SandboxKind,
    timing: ExecutionTiming,
    outcome: RunOutcome,
    checker: &SecurityChecker,
    timeout_secs: u64,
    memory_limit: u64,
) -> ExecutionResult {
    let channel = SideChannel::parse(&outcome.stdout, &outcome.stderr);
    let output = checker.sanitize_output(&channel.output);
    let fault = channel.fault.as_deref().map(redact_secrets);
    let memory_fault = channel
        .fault_summary()
        .is_some_and(|line| line.starts_with("MemoryError"));

    let failure = |status: ExecutionStatus, error: String, exit_code: i64| {
        ExecutionResult::failure(kind, timing, status, error)
            .with_output(output.clone())
            .with_return_value(channel.return_value.clone())
            .with_memory_used(outcome.peak_memory)
            .with_exit_code(exit_code)
    };

    match outcome.termination {
        Termination::TimedOut(_) => failure(
            ExecutionStatus::Timeout,
            format!("Execution timed out after {} seconds", timeout_secs),
            -1,
        ),
        Termination::Cancelled => failure(
            ExecutionStatus::Cancelled,
            "Execution was cancelled".to_string(),
            -1,
        ),
        Termination::Signaled(SIGXCPU) => failure(
            ExecutionStatus::Timeout,
            format!("CPU time limit exceeded (timeout {} seconds)", timeout_secs),
            128 + i64::from(SIGXCPU),
        ),
        Termination::Signaled(SIGKILL) | Termination::Exited(SIGKILL_EXIT_CODE) => failure(
            ExecutionStatus::MemoryExceeded,
            fault.unwrap_or_else(|| memory_message(memory_limit)),
            SIGKILL_EXIT_CODE,
        ),
        Termination::Exited(code) if memory_fault => failure(
            ExecutionStatus::MemoryExceeded,
            fault.unwrap_or_else(|| memory_message(memory_limit)),
            code,
        ),
        Termination::Signaled(signal) => failure(
            ExecutionStatus::Error,
            fault.unwrap_or_else(|| format!("Process terminated by signal {}", signal)),
            128 + i64::from(signal),
        ),
        Termination::Exited(0) if fault.is_none() => {
            ExecutionResult::success(kind, timing, output)
                .with_return_value(channel.return_value)
                .with_memory_used(outcome.peak_memory)
        }
        Termination::Exited(code) => failure(
            ExecutionStatus::Error,
            fault.unwrap_or_else(|| format!("Process exited with code {}", code)),
            code,
        ),
    }
}

fn memory_message(limit: u64) -> String {
    format!("Memory limit of {} bytes exceeded", limit)
}
