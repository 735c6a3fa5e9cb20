//! `runbox run`

use crate::args::{OutputFormat, RunArgs};
use anyhow::Context;
use runbox_core::{
    CancellationToken, ExecutionRequest, ExecutionResult, ResultFormatter, SandboxConfig,
    SandboxContext, SandboxFactory, SandboxGuard,
};
use std::process::ExitCode;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

pub async fn execute(mut config: SandboxConfig, args: RunArgs) -> anyhow::Result<ExitCode> {
    let code = super::read_source(&args.source)?;
    if let Some(path) = &args.audit_log {
        config.audit_log = Some(path.clone());
    }
    let backend = args.backend.clone().unwrap_or_else(|| config.backend.clone());
    let request = build_request(&config, code, &args);

    let config = Arc::new(config);
    let context = SandboxContext::new(&config);
    let sandbox = SandboxFactory::new()
        .create(&backend, Arc::clone(&config), context)
        .context("failed to create sandbox")?;
    let guard = SandboxGuard::acquire(sandbox)
        .await
        .with_context(|| format!("failed to initialize the {} backend", backend))?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling execution");
                cancel.cancel();
            }
        })
    };

    let result = guard.execute_cancellable(&request, &cancel).await;
    interrupt.abort();
    if let Err(e) = guard.release().await {
        tracing::warn!("Sandbox cleanup failed: {}", e);
    }

    println!("{}", render(&result, &args)?);
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_request(config: &SandboxConfig, code: String, args: &RunArgs) -> ExecutionRequest {
    let mut request = ExecutionRequest::new(code)
        .with_timeout(args.timeout.unwrap_or(config.default_timeout.as_secs()))
        .with_memory_limit(
            args.memory
                .map(|mib| mib.saturating_mul(MIB))
                .unwrap_or(config.default_memory_bytes),
        )
        .with_network(args.network);
    if let Some(input) = &args.input {
        request = request.with_input(input.clone());
    }
    request.actor = args.actor.clone();
    request.session_id = args.session.clone();
    request
}

fn render(result: &ExecutionResult, args: &RunArgs) -> anyhow::Result<String> {
    let mut formatter = ResultFormatter::new();
    if args.metrics {
        formatter = formatter.verbose();
    }
    if args.color {
        formatter = formatter.with_colors();
    }
    Ok(match args.format {
        OutputFormat::Text => formatter.to_text(result),
        OutputFormat::Markdown => formatter.to_markdown(result),
        OutputFormat::Json => serde_json::to_string_pretty(&formatter.to_json(result)?)?,
        OutputFormat::Llm => formatter.to_llm_context(result),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::SourceArgs;

    fn args() -> RunArgs {
        RunArgs {
            source: SourceArgs {
                file: None,
                code: Some("print(1)".into()),
            },
            backend: None,
            timeout: None,
            memory: None,
            network: false,
            input: None,
            format: OutputFormat::Text,
            metrics: false,
            color: false,
            audit_log: None,
            actor: None,
            session: None,
        }
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let config = SandboxConfig::default();
        let request = build_request(&config, "print(1)".into(), &args());
        assert_eq!(request.timeout, config.default_timeout.as_secs());
        assert_eq!(request.memory_limit, config.default_memory_bytes);
        assert!(!request.network_enabled);
    }

    #[test]
    fn test_request_applies_flags() {
        let mut args = args();
        args.timeout = Some(3);
        args.memory = Some(64);
        args.network = true;
        args.input = Some("5\n".into());
        args.actor = Some("alice".into());

        let request = build_request(&SandboxConfig::default(), "x".into(), &args);
        assert_eq!(request.timeout, 3);
        assert_eq!(request.memory_limit, 64 * MIB);
        assert!(request.network_enabled);
        assert_eq!(request.input_data.as_deref(), Some("5\n"));
        assert_eq!(request.actor.as_deref(), Some("alice"));
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_color_flag_styles_text_only() {
        let timing = runbox_core::ExecutionTiming::finish(chrono::Utc::now());
        let result = ExecutionResult::success(runbox_core::SandboxKind::Local, timing, "hi\n");

        let plain = render(&result, &args()).unwrap();
        assert!(!plain.contains('\x1b'));

        let mut colored = args();
        colored.color = true;
        let text = render(&result, &colored).unwrap();
        assert!(text.starts_with("\x1b[32m"));
        assert!(text.contains("hi"));

        colored.format = OutputFormat::Json;
        assert!(!render(&result, &colored).unwrap().contains('\x1b'));
    }
}
