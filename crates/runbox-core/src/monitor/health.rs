//! Periodic liveness probing of a sandbox backend

use crate::config::HealthConfig;
use crate::models::{ExecutionRequest, ExecutionStatus};
use crate::sandbox::Sandbox;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PROBE_CODE: &str = "print('hello')";
const PROBE_EXPECTED: &str = "hello";

/// Rolling health of one backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub total_failures: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Runs a hello-world execution through a sandbox and tracks the results.
///
/// The backend is reported unhealthy once `failure_threshold` probes in a row
/// have failed and recovers on the next successful probe.
pub struct HealthChecker {
    sandbox: Arc<dyn Sandbox>,
    interval: Duration,
    failure_threshold: u32,
    probe_timeout_secs: u64,
    status: Mutex<HealthStatus>,
}

impl HealthChecker {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: &HealthConfig) -> Self {
        Self {
            sandbox,
            interval: config.interval,
            failure_threshold: config.failure_threshold.max(1),
            probe_timeout_secs: config.probe_timeout_secs,
            status: Mutex::new(HealthStatus {
                healthy: true,
                ..Default::default()
            }),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.lock().healthy
    }

    pub fn status(&self) -> HealthStatus {
        self.status.lock().clone()
    }

    /// Run one probe and fold its outcome into the rolling status
    pub async fn check_once(&self) -> HealthStatus {
        let request = ExecutionRequest::new(PROBE_CODE).with_timeout(self.probe_timeout_secs);
        let result = self.sandbox.execute(&request).await;

        let failure = if result.status != ExecutionStatus::Success {
            Some(
                result
                    .error
                    .unwrap_or_else(|| format!("probe ended with status {}", result.status)),
            )
        } else if !result.output.contains(PROBE_EXPECTED) {
            Some(format!("unexpected probe output: {:?}", result.output))
        } else {
            None
        };

        let mut status = self.status.lock();
        status.total_checks += 1;
        status.last_check = Some(Utc::now());
        match failure {
            None => {
                if !status.healthy {
                    tracing::info!("{} sandbox recovered", self.sandbox.kind());
                }
                status.healthy = true;
                status.consecutive_failures = 0;
                status.last_error = None;
            }
            Some(error) => {
                status.total_failures += 1;
                status.consecutive_failures += 1;
                tracing::warn!(
                    backend = %self.sandbox.kind(),
                    consecutive_failures = status.consecutive_failures,
                    "Health probe failed: {}",
                    error
                );
                if status.consecutive_failures >= self.failure_threshold && status.healthy {
                    tracing::error!("{} sandbox marked unhealthy", self.sandbox.kind());
                    status.healthy = false;
                }
                status.last_error = Some(error);
            }
        }
        status.clone()
    }

    /// Probe every configured interval until `token` is cancelled
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Health checker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.check_once().await;
                    }
                }
            }
        })
    }
}
