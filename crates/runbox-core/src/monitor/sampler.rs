//! Background resource sampling feeding an [`ExecutionMonitor`]

use super::{ExecutionMonitor, ResourceSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Memory/CPU reader for a single host process
pub struct ProcessProbe {
    pid: Pid,
    system: System,
}

impl ProcessProbe {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Pid::from_u32(pid),
            system: System::new(),
        }
    }

    /// `None` once the process is gone
    pub fn sample(&mut self) -> Option<ResourceSnapshot> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        let process = self.system.process(self.pid)?;
        Some(ResourceSnapshot::now(
            process.memory(),
            Some(process.cpu_usage()),
        ))
    }
}

/// Running sampler task
pub struct SamplerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Stop sampling and wait for the task to exit
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::debug!("Sampler task ended abnormally: {}", e);
        }
    }
}

/// Call `sample` every `interval` and record readings into `monitor`
/// until the returned handle is stopped.
pub fn spawn_sampler<S, Fut>(
    monitor: Arc<ExecutionMonitor>,
    interval: Duration,
    mut sample: S,
) -> SamplerHandle
where
    S: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Option<ResourceSnapshot>> + Send,
{
    let token = CancellationToken::new();
    let child = token.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = child.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(snapshot) = sample().await {
                        monitor.record(snapshot);
                    }
                }
            }
        }
    });
    SamplerHandle { token, task }
}
