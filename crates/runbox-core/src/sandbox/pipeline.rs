//! Execution pipeline shared by every backend

use super::context::SandboxContext;
use super::outcome::{RunOutcome, finalize};
use crate::cleanup::OwnerId;
use crate::config::SandboxConfig;
use crate::error::SandboxResult;
use crate::limits::ResourceLimiter;
use crate::models::{
    ExecutionPhase, ExecutionRequest, ExecutionResult, ExecutionStatus, ExecutionTiming,
    SandboxKind,
};
use crate::monitor::{ExecutionMonitor, TimeoutManager};
use crate::security::SecurityChecker;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;

/// Check, clamp, run, finalize, log.
///
/// Backends supply only the step that actually runs the guest; everything
/// around it is identical for all of them.
#[derive(Debug, Clone)]
pub struct Pipeline {
    kind: SandboxKind,
    checker: SecurityChecker,
    limiter: ResourceLimiter,
    timeouts: TimeoutManager,
    context: SandboxContext,
    /// Tags every workspace and container this pipeline's sandbox creates
    owner: OwnerId,
}

impl Pipeline {
    pub fn new(
        kind: SandboxKind,
        config: &SandboxConfig,
        context: SandboxContext,
    ) -> SandboxResult<Self> {
        Ok(Self {
            kind,
            checker: SecurityChecker::new(config)?,
            limiter: ResourceLimiter::new(config),
            timeouts: TimeoutManager::new(),
            context,
            owner: OwnerId::new(),
        })
    }

    pub fn kind(&self) -> SandboxKind {
        self.kind
    }

    pub fn checker(&self) -> &SecurityChecker {
        &self.checker
    }

    pub fn limiter(&self) -> &ResourceLimiter {
        &self.limiter
    }

    pub fn timeouts(&self) -> &TimeoutManager {
        &self.timeouts
    }

    pub fn context(&self) -> &SandboxContext {
        &self.context
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Drive one request to a terminal result.
    ///
    /// `run` receives the clamped request and a started monitor. It is never
    /// called for a request the security checker rejects, and any error it
    /// returns becomes an `Error` result.
    pub async fn execute<F, Fut>(&self, request: &ExecutionRequest, run: F) -> ExecutionResult
    where
        F: FnOnce(ExecutionRequest, Arc<ExecutionMonitor>) -> Fut,
        Fut: Future<Output = SandboxResult<RunOutcome>>,
    {
        let started_at = Utc::now();
        self.context.logger.log_request(request, self.kind);

        let phase = advance(ExecutionPhase::Pending, ExecutionPhase::Checking);
        let report = self.checker.check(&request.code);

        let result = if !report.safe {
            advance(
                phase,
                ExecutionPhase::Finished(ExecutionStatus::SecurityViolation),
            );
            ExecutionResult::failure(
                self.kind,
                ExecutionTiming::finish(started_at),
                ExecutionStatus::SecurityViolation,
                report.message(),
            )
        } else {
            let clamped = self.limiter.clamp(request);
            let phase = advance(phase, ExecutionPhase::Running);

            let monitor = Arc::new(ExecutionMonitor::new(
                self.limiter.timeout(&clamped),
                clamped.memory_limit,
            ));
            monitor.start();

            let outcome = run(clamped.clone(), Arc::clone(&monitor)).await;
            monitor.stop();

            let result = match outcome {
                Ok(outcome) => {
                    let peak = outcome.peak_memory.max(monitor.peak_memory());
                    finalize(
                        self.kind,
                        ExecutionTiming::finish(started_at),
                        outcome.with_peak_memory(peak),
                        &self.checker,
                        clamped.timeout,
                        clamped.memory_limit,
                    )
                }
                Err(e) => {
                    tracing::error!(backend = %self.kind, "Backend failure: {}", e);
                    ExecutionResult::failure(
                        self.kind,
                        ExecutionTiming::finish(started_at),
                        ExecutionStatus::Error,
                        e.to_string(),
                    )
                    .with_memory_used(monitor.peak_memory())
                }
            };
            advance(phase, ExecutionPhase::Finished(result.status));
            result
        };

        self.context.logger.log_result(&result);
        if let Some(audit) = &self.context.audit {
            audit.record(request, &result).await;
        }
        result
    }
}

fn advance(from: ExecutionPhase, to: ExecutionPhase) -> ExecutionPhase {
    match from.advance(to) {
        Ok(next) => {
            tracing::debug!("Execution phase {} -> {}", from, next);
            next
        }
        Err(e) => {
            tracing::error!("{}", e);
            to
        }
    }
}
