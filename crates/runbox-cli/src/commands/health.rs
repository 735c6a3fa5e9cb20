//! `runbox health`

use anyhow::Context;
use runbox_core::{HealthChecker, SandboxConfig, SandboxContext, SandboxFactory, SandboxGuard};
use std::process::ExitCode;
use std::sync::Arc;

pub async fn execute(config: SandboxConfig, backend: Option<String>) -> anyhow::Result<ExitCode> {
    let backend = backend.unwrap_or_else(|| config.backend.clone());
    let config = Arc::new(config);
    let context = SandboxContext::new(&config);
    let sandbox = SandboxFactory::new()
        .create(&backend, Arc::clone(&config), context)
        .context("failed to create sandbox")?;
    let guard = SandboxGuard::acquire(Arc::clone(&sandbox))
        .await
        .with_context(|| format!("failed to initialize the {} backend", backend))?;

    let checker = HealthChecker::new(sandbox, &config.health);
    let status = checker.check_once().await;
    if let Err(e) = guard.release().await {
        tracing::warn!("Sandbox cleanup failed: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(if status.consecutive_failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
