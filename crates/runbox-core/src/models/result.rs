//! Execution result and terminal status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of terminal execution outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    /// Uncaught runtime fault or non-zero exit
    Error,
    Timeout,
    MemoryExceeded,
    /// Rejected by the security checker before any execution
    SecurityViolation,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::MemoryExceeded => "memory_exceeded",
            Self::SecurityViolation => "security_violation",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// All outcomes are terminal; kept for symmetry with `ExecutionPhase`
    pub fn is_terminal(&self) -> bool {
        true
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxKind {
    Local,
    Container,
}

impl SandboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for SandboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator-owned wall-clock bounds of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionTiming {
    /// Close a timing window that opened at `started_at`
    pub fn finish(started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            started_at,
            finished_at: now.max(started_at),
        }
    }

    /// Elapsed seconds between start and finish
    pub fn seconds(&self) -> f64 {
        let delta = self.finished_at - self.started_at;
        match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => delta.num_milliseconds() as f64 / 1000.0,
        }
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// Captured program output, sanitized and possibly truncated
    pub output: String,

    pub error: Option<String>,

    /// `repr` of a trailing expression statement, if any
    pub return_value: Option<String>,

    /// Seconds between `started_at` and `finished_at`
    pub execution_time: f64,

    /// Peak memory in bytes
    pub memory_used: u64,

    pub exit_code: i64,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub sandbox_type: SandboxKind,
}

impl ExecutionResult {
    /// A successful run
    pub fn success(kind: SandboxKind, timing: ExecutionTiming, output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: output.into(),
            error: None,
            return_value: None,
            execution_time: timing.seconds(),
            memory_used: 0,
            exit_code: 0,
            started_at: timing.started_at,
            finished_at: timing.finished_at,
            sandbox_type: kind,
        }
    }

    /// A failed run; `exit_code` defaults to -1 until a real one is attached
    pub fn failure(
        kind: SandboxKind,
        timing: ExecutionTiming,
        status: ExecutionStatus,
        error: impl Into<String>,
    ) -> Self {
        debug_assert!(!status.is_success(), "failure() requires a non-success status");
        let mut error = error.into();
        if error.trim().is_empty() {
            error = format!("Execution ended with status {}", status);
        }
        Self {
            status,
            output: String::new(),
            error: Some(error),
            return_value: None,
            execution_time: timing.seconds(),
            memory_used: 0,
            exit_code: -1,
            started_at: timing.started_at,
            finished_at: timing.finished_at,
            sandbox_type: kind,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_return_value(mut self, value: Option<String>) -> Self {
        self.return_value = value;
        self
    }

    pub fn with_memory_used(mut self, bytes: u64) -> Self {
        self.memory_used = bytes;
        self
    }

    /// Attach the process exit code of a failed run. Zero is kept at -1 so a
    /// failure never looks like a clean exit.
    pub fn with_exit_code(mut self, code: i64) -> Self {
        if !self.status.is_success() {
            self.exit_code = if code == 0 { -1 } else { code };
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `status == Success` iff there is no error and the exit code is zero
    pub fn upholds_invariant(&self) -> bool {
        self.status.is_success() == (self.error.is_none() && self.exit_code == 0)
    }
}
