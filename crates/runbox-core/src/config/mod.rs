//! Sandbox configuration
//!
//! A `SandboxConfig` is loaded once when a sandbox is constructed and is
//! immutable afterwards; sandboxes hold it behind an `Arc`.

mod defaults;
mod loader;

pub use defaults::{
    default_allowed_imports, default_blocked_attributes, default_blocked_calls,
    default_blocked_dunders, default_blocked_patterns, preloaded_modules,
};
pub use loader::{ConfigLoader, ConfigSource};

use crate::error::{SandboxError, SandboxResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Smallest timeout the backends can enforce
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Smallest memory cap the backends can enforce (32 MiB)
pub const MIN_MEMORY_BYTES: u64 = 32 * 1024 * 1024;

/// Process-wide sandbox tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Backend used when none is named explicitly
    pub backend: String,

    /// Container image for the container backend
    pub image: String,

    /// Interpreter for the local backend
    pub python_executable: String,

    /// Timeout applied when a caller does not choose one
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Upper bound for any request timeout, in seconds
    pub max_timeout_secs: u64,

    /// Memory limit applied when a caller does not choose one
    pub default_memory_bytes: u64,

    /// Upper bound for any request memory limit
    pub max_memory_bytes: u64,

    /// Fraction of one CPU granted to a run
    pub cpu_limit: f64,

    /// Process / thread cap
    pub max_processes: u32,

    pub max_open_files: u32,

    /// Largest file the guest may write
    pub max_file_size_bytes: u64,

    /// Import allow-list
    pub allowed_imports: Vec<String>,

    /// Regular expressions rejecting a script on a single match
    pub blocked_patterns: Vec<String>,

    /// Built-in functions that may not be called
    pub blocked_calls: Vec<String>,

    /// Method names that may not be called
    pub blocked_attributes: Vec<String>,

    /// Attributes that may not be accessed at all
    pub blocked_dunders: Vec<String>,

    /// Modules pre-imported into the restricted local namespace
    pub preloaded_modules: Vec<String>,

    /// Root directory for per-run workspaces
    pub temp_dir: PathBuf,

    /// Maximum characters of output kept in a result
    pub max_output_size: usize,

    /// Extra wall-clock allowance for container teardown
    #[serde(with = "humantime_serde")]
    pub container_grace_period: Duration,

    /// Append-only audit log, disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,

    pub health: HealthConfig,

    pub cleanup: CleanupConfig,
}

/// Health checker tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Consecutive failures before a backend is reported unhealthy
    pub failure_threshold: u32,

    /// Timeout for the probe execution, in seconds
    pub probe_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            failure_threshold: 3,
            probe_timeout_secs: 10,
        }
    }
}

/// Periodic cleanup tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Workspaces and containers older than this are considered orphaned
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            max_age: Duration::from_secs(3600),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            image: "python:3.11-slim".to_string(),
            python_executable: "python3".to_string(),
            default_timeout: Duration::from_secs(30),
            max_timeout_secs: 300,
            default_memory_bytes: 512 * 1024 * 1024, // 512 MB
            max_memory_bytes: 4 * 1024 * 1024 * 1024, // 4 GB
            cpu_limit: 1.0,
            max_processes: 64,
            max_open_files: 256,
            max_file_size_bytes: 10 * 1024 * 1024, // 10 MB
            allowed_imports: default_allowed_imports(),
            blocked_patterns: default_blocked_patterns(),
            blocked_calls: default_blocked_calls(),
            blocked_attributes: default_blocked_attributes(),
            blocked_dunders: default_blocked_dunders(),
            preloaded_modules: preloaded_modules(),
            temp_dir: std::env::temp_dir().join("runbox"),
            max_output_size: 10_000,
            container_grace_period: Duration::from_secs(5),
            audit_log: None,
            health: HealthConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Create a strict configuration (small limits, no data-processing libraries)
    pub fn strict() -> Self {
        let heavy = ["numpy", "pandas", "hashlib", "base64"];
        Self {
            default_timeout: Duration::from_secs(10),
            max_timeout_secs: 60,
            default_memory_bytes: 128 * 1024 * 1024,
            max_memory_bytes: 512 * 1024 * 1024,
            cpu_limit: 0.5,
            max_processes: 16,
            max_open_files: 64,
            max_file_size_bytes: 1024 * 1024,
            allowed_imports: default_allowed_imports()
                .into_iter()
                .filter(|m| !heavy.contains(&m.as_str()))
                .collect(),
            max_output_size: 4_000,
            ..Self::default()
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> SandboxResult<()> {
        if self.max_timeout_secs < MIN_TIMEOUT_SECS {
            return Err(SandboxError::InvalidConfig(
                "max_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(SandboxError::InvalidConfig(
                "default_timeout must be positive".to_string(),
            ));
        }
        if self.max_memory_bytes < MIN_MEMORY_BYTES {
            return Err(SandboxError::InvalidConfig(format!(
                "max_memory_bytes must be at least {} bytes",
                MIN_MEMORY_BYTES
            )));
        }
        if self.default_memory_bytes > self.max_memory_bytes {
            return Err(SandboxError::InvalidConfig(
                "default_memory_bytes exceeds max_memory_bytes".to_string(),
            ));
        }
        if !(self.cpu_limit > 0.0) {
            return Err(SandboxError::InvalidConfig(
                "cpu_limit must be a positive fraction".to_string(),
            ));
        }
        if self.max_processes == 0 || self.max_open_files == 0 {
            return Err(SandboxError::InvalidConfig(
                "process and file descriptor caps must be positive".to_string(),
            ));
        }
        if self.max_output_size == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_output_size must be positive".to_string(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(SandboxError::InvalidConfig(
                "health.failure_threshold must be positive".to_string(),
            ));
        }
        for pattern in &self.blocked_patterns {
            regex::Regex::new(pattern).map_err(|source| SandboxError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> SandboxResult<Self> {
        let config: SandboxConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether `module` (or its top-level package) is on the allow-list
    pub fn is_import_allowed(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.allowed_imports.iter().any(|m| m == root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SandboxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_memory_bytes, 512 * 1024 * 1024);
        assert_eq!(config.backend, "local");
    }

    #[test]
    fn test_strict_config() {
        let config = SandboxConfig::strict();
        assert!(config.validate().is_ok());
        assert!(!config.is_import_allowed("numpy"));
        assert!(config.is_import_allowed("math"));
    }

    #[test]
    fn test_import_allowed_uses_root_package() {
        let config = SandboxConfig::default();
        assert!(config.is_import_allowed("collections.abc"));
        assert!(!config.is_import_allowed("os.path"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SandboxConfig::default();
        config.cpu_limit = 0.0;
        assert!(config.validate().is_err());

        let mut config = SandboxConfig::default();
        config.default_memory_bytes = config.max_memory_bytes + 1;
        assert!(config.validate().is_err());

        let mut config = SandboxConfig::default();
        config.blocked_patterns.push("(unclosed".to_string());
        assert!(matches!(
            config.validate(),
            Err(SandboxError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SandboxConfig::from_toml_str(
            r#"
            image = "python:3.12-slim"
            default_timeout = "45s"
            max_output_size = 2048

            [health]
            failure_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.image, "python:3.12-slim");
        assert_eq!(config.default_timeout, Duration::from_secs(45));
        assert_eq!(config.max_output_size, 2048);
        assert_eq!(config.health.failure_threshold, 5);
        assert_eq!(config.health.interval, Duration::from_secs(60));
        assert!(config.is_import_allowed("json"));
    }
}
