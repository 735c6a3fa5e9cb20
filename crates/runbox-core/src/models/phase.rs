//! Per-execution lifecycle

use super::result::ExecutionStatus;
use crate::error::{SandboxError, SandboxResult};
use std::fmt;

/// Where a single execution is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Pending,
    /// Static security analysis in progress
    Checking,
    /// Backend is running the guest; the monitor is live
    Running,
    /// Terminal: rejected or finished
    Finished(ExecutionStatus),
}

impl ExecutionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// Validate and perform a transition
    pub fn advance(self, next: ExecutionPhase) -> SandboxResult<ExecutionPhase> {
        let allowed = match (self, next) {
            (Self::Pending, Self::Checking) => true,
            (Self::Checking, Self::Running) => true,
            (Self::Checking, Self::Finished(ExecutionStatus::SecurityViolation)) => true,
            // Backend could not even start (e.g. docker unreachable)
            (Self::Checking, Self::Finished(ExecutionStatus::Error)) => true,
            (Self::Running, Self::Finished(status)) => {
                status != ExecutionStatus::SecurityViolation
            }
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(SandboxError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Checking => f.write_str("checking"),
            Self::Running => f.write_str("running"),
            Self::Finished(status) => write!(f, "finished({})", status),
        }
    }
}
