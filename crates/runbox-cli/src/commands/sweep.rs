//! `runbox sweep`

use runbox_core::{CleanupScheduler, ContainerCleanup, ContainerRegistry, SandboxConfig, TempFileManager};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

pub async fn execute(
    config: &SandboxConfig,
    max_age_secs: Option<u64>,
    containers: bool,
    watch: bool,
) -> anyhow::Result<ExitCode> {
    let max_age = max_age_secs
        .map(Duration::from_secs)
        .unwrap_or(config.cleanup.max_age);
    let temp_files = Arc::new(TempFileManager::new(config.temp_dir.clone()));
    let docker = if containers {
        Some(ContainerCleanup::connect_local(Arc::new(ContainerRegistry::new()))?)
    } else {
        None
    };

    if watch {
        tracing::info!(
            interval = ?config.cleanup.sweep_interval,
            "Sweeping until interrupted"
        );
        let scheduler =
            CleanupScheduler::spawn(temp_files, docker, config.cleanup.sweep_interval, max_age);
        tokio::signal::ctrl_c().await?;
        scheduler.shutdown().await;
        return Ok(ExitCode::SUCCESS);
    }

    let workspaces = temp_files.sweep_stale(max_age);
    println!("Removed {} stale workspace(s)", workspaces);
    if let Some(docker) = docker {
        let removed = docker.sweep_orphans(max_age).await?;
        println!("Removed {} orphaned container(s)", removed);
    }
    Ok(ExitCode::SUCCESS)
}
