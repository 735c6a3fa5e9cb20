//! Local backend integration tests; skipped when `python3` is missing.

use runbox_core::{
    CancellationToken, ExecutionRequest, ExecutionStatus, LocalSandbox, SandboxConfig,
    SandboxContext, SandboxGuard,
};
use std::sync::Arc;
use std::time::Duration;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: Arc<SandboxConfig>,
    context: SandboxContext,
}

fn fixture(tweak: impl FnOnce(&mut SandboxConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SandboxConfig {
        temp_dir: dir.path().join("runs"),
        ..Default::default()
    };
    tweak(&mut config);
    let context = SandboxContext::new(&config);
    Fixture {
        _dir: dir,
        config: Arc::new(config),
        context,
    }
}

async fn sandbox(fx: &Fixture) -> SandboxGuard {
    let local = LocalSandbox::new(Arc::clone(&fx.config), fx.context.clone()).unwrap();
    SandboxGuard::acquire(Arc::new(local)).await.unwrap()
}

#[tokio::test]
async fn test_workspaces_are_reclaimed() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let guard = sandbox(&fx).await;

    for _ in 0..3 {
        let result = guard.execute(&ExecutionRequest::new("print('ok')")).await;
        assert_eq!(result.status, ExecutionStatus::Success);
    }
    assert_eq!(fx.context.temp_files.live_count(), 0);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_stdin_reaches_the_guest() {
    if !python_available() {
        return;
    }
    let fx = fixture(|config| config.blocked_calls.retain(|c| c != "input"));
    let guard = sandbox(&fx).await;

    let request = ExecutionRequest::new("print(int(input()) * 2)").with_input("21\n");
    let result = guard.execute(&request).await;
    assert_eq!(result.status, ExecutionStatus::Success, "{:?}", result.error);
    assert_eq!(result.output.trim(), "42");
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_restricted_getattr() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let guard = sandbox(&fx).await;

    let result = guard
        .execute(&ExecutionRequest::new("getattr(1, '__class__')"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result.error.unwrap().contains("AttributeError"));
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_output_is_truncated() {
    if !python_available() {
        return;
    }
    let fx = fixture(|config| config.max_output_size = 100);
    let guard = sandbox(&fx).await;

    let result = guard.execute(&ExecutionRequest::new("print('z' * 5000)")).await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert!(result.output.ends_with("[output truncated]"));
    assert!(result.output.chars().count() < 200);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_non_zero_exit() {
    if !python_available() {
        return;
    }
    let fx = fixture(|config| config.allowed_imports.push("sys".into()));
    let guard = sandbox(&fx).await;

    let result = guard
        .execute(&ExecutionRequest::new("import sys\nsys.exit(3)"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.exit_code, 3);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_kills_the_guest() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let guard = sandbox(&fx).await;
    let cancel = CancellationToken::new();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        })
    };
    let request = ExecutionRequest::new("while True:\n    pass").with_timeout(30);
    let result = guard.execute_cancellable(&request, &cancel).await;
    trigger.await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.execution_time < 10.0);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_health_check() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let guard = sandbox(&fx).await;
    assert!(guard.health_check().await);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_runs_share_one_context() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let first = sandbox(&fx).await;
    let second = sandbox(&fx).await;

    let first_req = ExecutionRequest::new("print('first')");
    let second_req = ExecutionRequest::new("print('second')");
    let (a, b) = tokio::join!(
        first.execute(&first_req),
        second.execute(&second_req),
    );
    assert_eq!(a.status, ExecutionStatus::Success, "{:?}", a.error);
    assert_eq!(b.status, ExecutionStatus::Success, "{:?}", b.error);
    assert_eq!(a.output.trim(), "first");
    assert_eq!(b.output.trim(), "second");
    assert_eq!(fx.context.temp_files.live_count(), 0);

    first.release().await.unwrap();
    second.release().await.unwrap();
}

#[tokio::test]
async fn test_sibling_cleanup_leaves_in_flight_run_alone() {
    if !python_available() {
        return;
    }
    let fx = fixture(|_| {});
    let idle = sandbox(&fx).await;
    let busy = sandbox(&fx).await;

    let running = {
        let busy = Arc::clone(busy.sandbox());
        tokio::spawn(async move {
            let request = ExecutionRequest::new("import time\ntime.sleep(1.5)\nprint('done')");
            busy.execute(&request).await
        })
    };
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(fx.context.temp_files.live_count(), 1);

    idle.release().await.unwrap();
    assert_eq!(fx.context.temp_files.live_count(), 1);

    let result = running.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Success, "{:?}", result.error);
    assert_eq!(result.output.trim(), "done");
    busy.release().await.unwrap();
}
