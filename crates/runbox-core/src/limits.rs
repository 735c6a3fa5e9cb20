//! Resource limits for sandboxed execution.
//!
//! [`ResourceLimiter`] is a pure translation layer: it clamps a request's
//! logical budget into enforceable ranges and turns it into the limit set a
//! particular backend understands.

use crate::config::{MIN_MEMORY_BYTES, MIN_TIMEOUT_SECS, SandboxConfig};
use crate::models::ExecutionRequest;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CFS scheduling period used for the CPU quota (100ms)
pub const CPU_PERIOD_MICROS: i64 = 100_000;

/// One `ulimit` entry for a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ulimit {
    pub name: String,
    pub soft: i64,
    pub hard: i64,
}

impl Ulimit {
    fn fixed(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            soft: value,
            hard: value,
        }
    }
}

/// Limits for the container backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLimits {
    pub memory_bytes: i64,
    /// Equal to `memory_bytes` so the container cannot swap
    pub memory_swap_bytes: i64,
    pub cpu_period: i64,
    /// `cpu_period * cpu_limit`
    pub cpu_quota: i64,
    pub pids_limit: i64,
    pub ulimits: Vec<Ulimit>,
    pub network_disabled: bool,
}

/// POSIX rlimits for the local backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLimits {
    /// RLIMIT_AS
    pub address_space_bytes: u64,
    /// RLIMIT_CPU; one second above the wall-clock timeout
    pub cpu_seconds: u64,
    /// RLIMIT_NOFILE
    pub open_files: u64,
    /// RLIMIT_NPROC
    pub processes: u64,
    /// RLIMIT_FSIZE
    pub file_size_bytes: u64,
}

/// Stateless translator from configuration + request to backend limits
#[derive(Debug, Clone)]
pub struct ResourceLimiter {
    max_timeout_secs: u64,
    max_memory_bytes: u64,
    cpu_limit: f64,
    max_processes: u32,
    max_open_files: u32,
    max_file_size_bytes: u64,
}

impl ResourceLimiter {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            max_timeout_secs: config.max_timeout_secs.max(MIN_TIMEOUT_SECS),
            max_memory_bytes: config.max_memory_bytes.max(MIN_MEMORY_BYTES),
            cpu_limit: config.cpu_limit,
            max_processes: config.max_processes,
            max_open_files: config.max_open_files,
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }

    pub fn clamp_timeout(&self, seconds: u64) -> u64 {
        seconds.clamp(MIN_TIMEOUT_SECS, self.max_timeout_secs)
    }

    pub fn clamp_memory(&self, bytes: u64) -> u64 {
        bytes.clamp(MIN_MEMORY_BYTES, self.max_memory_bytes)
    }

    /// Copy of `request` with timeout and memory limit in enforceable ranges
    pub fn clamp(&self, request: &ExecutionRequest) -> ExecutionRequest {
        let mut clamped = request.clone();
        clamped.timeout = self.clamp_timeout(request.timeout);
        clamped.memory_limit = self.clamp_memory(request.memory_limit);
        if clamped.timeout != request.timeout || clamped.memory_limit != request.memory_limit {
            tracing::debug!(
                timeout = clamped.timeout,
                memory_limit = clamped.memory_limit,
                "Clamped request limits"
            );
        }
        clamped
    }

    /// Wall-clock bound for `request`
    pub fn timeout(&self, request: &ExecutionRequest) -> Duration {
        Duration::from_secs(self.clamp_timeout(request.timeout))
    }

    pub fn container_limits(&self, request: &ExecutionRequest) -> ContainerLimits {
        let memory = clamp_i64(self.clamp_memory(request.memory_limit));
        let cpu_quota = ((CPU_PERIOD_MICROS as f64) * self.cpu_limit).round() as i64;
        ContainerLimits {
            memory_bytes: memory,
            memory_swap_bytes: memory,
            cpu_period: CPU_PERIOD_MICROS,
            // The kernel rejects quotas below 1ms
            cpu_quota: cpu_quota.max(1_000),
            pids_limit: i64::from(self.max_processes),
            ulimits: vec![
                Ulimit::fixed("nofile", i64::from(self.max_open_files)),
                Ulimit::fixed("nproc", i64::from(self.max_processes)),
                Ulimit::fixed("fsize", clamp_i64(self.max_file_size_bytes)),
            ],
            network_disabled: !request.network_enabled,
        }
    }

    pub fn process_limits(&self, request: &ExecutionRequest) -> ProcessLimits {
        ProcessLimits {
            address_space_bytes: self.clamp_memory(request.memory_limit),
            cpu_seconds: self.clamp_timeout(request.timeout) + 1,
            open_files: u64::from(self.max_open_files),
            processes: u64::from(self.max_processes),
            file_size_bytes: self.max_file_size_bytes,
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Install `limits` on `cmd` so they take effect in the child before exec
#[cfg(unix)]
pub(crate) fn apply_process_limits(cmd: &mut tokio::process::Command, limits: &ProcessLimits) {
    let limits = *limits;

    // SAFETY: pre_exec runs between fork() and exec() in the child process.
    // The closure only calls setrlimit, which is async-signal-safe, and
    // captures a Copy value, so no state is shared with the parent.
    unsafe {
        cmd.pre_exec(move || {
            let pairs = [
                (libc::RLIMIT_AS, limits.address_space_bytes),
                (libc::RLIMIT_CPU, limits.cpu_seconds),
                (libc::RLIMIT_NOFILE, limits.open_files),
                (libc::RLIMIT_NPROC, limits.processes),
                (libc::RLIMIT_FSIZE, limits.file_size_bytes),
            ];
            for (resource, value) in pairs {
                let limit = libc::rlimit {
                    rlim_cur: value as libc::rlim_t,
                    rlim_max: value as libc::rlim_t,
                };
                libc::setrlimit(resource, &limit);
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn apply_process_limits(_cmd: &mut tokio::process::Command, _limits: &ProcessLimits) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ResourceLimiter {
        ResourceLimiter::new(&SandboxConfig::default())
    }

    #[test]
    fn test_timeout_clamped() {
        let limiter = limiter();
        assert_eq!(limiter.clamp_timeout(0), 1);
        assert_eq!(limiter.clamp_timeout(30), 30);
        assert_eq!(limiter.clamp_timeout(10_000), 300);
    }

    #[test]
    fn test_memory_clamped() {
        let limiter = limiter();
        assert_eq!(limiter.clamp_memory(1), MIN_MEMORY_BYTES);
        assert_eq!(limiter.clamp_memory(u64::MAX), 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_clamp_request() {
        let request = ExecutionRequest::new("pass").with_timeout(0).with_memory_limit(0);
        let clamped = limiter().clamp(&request);
        assert_eq!(clamped.timeout, 1);
        assert_eq!(clamped.memory_limit, MIN_MEMORY_BYTES);
        assert_eq!(clamped.code, "pass");
    }

    #[test]
    fn test_container_limits() {
        let mut config = SandboxConfig::default();
        config.cpu_limit = 0.5;
        let limits = ResourceLimiter::new(&config)
            .container_limits(&ExecutionRequest::new("pass").with_memory_limit(256 * 1024 * 1024));

        assert_eq!(limits.memory_bytes, 256 * 1024 * 1024);
        assert_eq!(limits.memory_swap_bytes, limits.memory_bytes);
        assert_eq!(limits.cpu_period, 100_000);
        assert_eq!(limits.cpu_quota, 50_000);
        assert_eq!(limits.pids_limit, 64);
        assert!(limits.network_disabled);
        let names: Vec<_> = limits.ulimits.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["nofile", "nproc", "fsize"]);
    }

    #[test]
    fn test_network_flag() {
        let limits = limiter().container_limits(&ExecutionRequest::new("pass").with_network(true));
        assert!(!limits.network_disabled);
    }

    #[test]
    fn test_process_limits() {
        let limits = limiter().process_limits(&ExecutionRequest::new("pass").with_timeout(5));
        assert_eq!(limits.cpu_seconds, 6);
        assert_eq!(limits.address_space_bytes, 512 * 1024 * 1024);
        assert_eq!(limits.open_files, 256);
    }

    #[test]
    fn test_limiter_is_repeatable() {
        let limiter = limiter();
        let request = ExecutionRequest::new("pass");
        assert_eq!(limiter.container_limits(&request), limiter.container_limits(&request));
    }
}
