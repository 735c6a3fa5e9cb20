//! Periodic background sweep

use super::{ContainerCleanup, TempFileManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running sweep task; call [`shutdown`](Self::shutdown) to stop it
pub struct CleanupScheduler {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Sweep stale workspaces (and orphaned containers when a Docker
    /// connection is supplied) every `interval`
    pub fn spawn(
        temp_files: Arc<TempFileManager>,
        containers: Option<ContainerCleanup>,
        interval: Duration,
        max_age: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let files = temp_files.sweep_stale(max_age);
                        let removed = match &containers {
                            Some(cleanup) => cleanup.sweep_orphans(max_age).await.unwrap_or_else(|e| {
                                tracing::warn!("Container sweep failed: {}", e);
                                0
                            }),
                            None => 0,
                        };
                        tracing::debug!(workspaces = files, containers = removed, "Cleanup sweep finished");
                    }
                }
            }
        });

        Self { token, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::debug!("Cleanup task ended abnormally: {}", e);
        }
    }
}
