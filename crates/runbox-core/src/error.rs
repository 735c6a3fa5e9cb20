//! Error types for runbox
//!
//! `SandboxError` covers failures of the sandbox machinery itself (configuration,
//! backend plumbing, I/O). Faults raised by guest code are never represented
//! here; they are captured into an [`ExecutionResult`](crate::models::ExecutionResult).

use std::time::Duration;

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors that can occur while operating a sandbox
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Invalid configuration
    #[error("Invalid sandbox configuration: {0}")]
    InvalidConfig(String),

    /// A blocked pattern failed to compile
    #[error("Invalid blocked pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Backend initialization failed
    #[error("Sandbox initialization failed: {0}")]
    InitializationFailed(String),

    /// Docker engine error
    #[error("Container backend error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Process spawn failed
    #[error("Failed to spawn sandboxed process: {0}")]
    SpawnFailed(String),

    /// Unknown backend name requested from the factory
    #[error("Unknown sandbox backend '{0}'")]
    UnknownBackend(String),

    /// Illegal execution phase transition
    #[error("Invalid execution phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Operation exceeded its deadline
    #[error("Sandbox operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Internal error
    #[error("Sandbox internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    /// Whether the error originates in the isolation backend rather than configuration
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Docker(_) | Self::SpawnFailed(_) | Self::InitializationFailed(_) | Self::Io(_)
        )
    }
}
