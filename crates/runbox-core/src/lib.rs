//! Runbox Core Library
//!
//! Bounded, classified execution of untrusted Python snippets: static
//! security checks, subprocess and container backends, resource limits,
//! run-time monitoring, fault classification, result formatting and
//! deterministic cleanup.

pub mod classifier;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod limits;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod output;
pub mod runner;
pub mod sandbox;
pub mod security;

// Re-export commonly used types
pub use classifier::{Classification, ErrorKind, classify};
pub use cleanup::{
    CleanupScheduler, ContainerCleanup, ContainerRegistry, OwnerId, TempFileManager,
};
pub use config::{ConfigLoader, HealthConfig, SandboxConfig};
pub use error::{SandboxError, SandboxResult};
pub use limits::{ContainerLimits, ProcessLimits, ResourceLimiter};
pub use logging::{AuditEntry, AuditLog, ExecutionLogger};
pub use models::*;
pub use monitor::{ExecutionMonitor, HealthChecker, HealthStatus, TimeoutManager};
pub use output::{ResultFormatter, smart_truncate, truncate_head, truncate_output};
pub use runner::{execute_once, run_code, run_code_with};
pub use sandbox::{
    ContainerSandbox, LocalSandbox, Sandbox, SandboxContext, SandboxFactory, SandboxGuard,
};
pub use security::{SecurityChecker, SecurityReport, Violation};
pub use tokio_util::sync::CancellationToken;
