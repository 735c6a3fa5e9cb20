//! RAII handle tying a sandbox's lifetime to a scope

use super::Sandbox;
use crate::error::SandboxResult;
use std::ops::Deref;
use std::sync::Arc;

/// Initialized sandbox that is cleaned up when released or dropped.
///
/// Prefer [`release`](Self::release), which awaits cleanup. Dropping the
/// guard without releasing it schedules cleanup on the current Tokio runtime.
pub struct SandboxGuard {
    sandbox: Arc<dyn Sandbox>,
    armed: bool,
}

impl SandboxGuard {
    /// Initialize `sandbox` and take responsibility for its cleanup
    pub async fn acquire(sandbox: Arc<dyn Sandbox>) -> SandboxResult<Self> {
        if let Err(e) = sandbox.initialize().await {
            if let Err(cleanup) = sandbox.cleanup().await {
                tracing::warn!("Cleanup after failed initialization failed: {}", cleanup);
            }
            return Err(e);
        }
        Ok(Self {
            sandbox,
            armed: true,
        })
    }

    /// Clean up now and report the outcome
    pub async fn release(mut self) -> SandboxResult<()> {
        self.armed = false;
        self.sandbox.cleanup().await
    }

    pub fn sandbox(&self) -> &Arc<dyn Sandbox> {
        &self.sandbox
    }
}

impl Deref for SandboxGuard {
    type Target = dyn Sandbox;

    fn deref(&self) -> &Self::Target {
        self.sandbox.as_ref()
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let sandbox = Arc::clone(&self.sandbox);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sandbox.cleanup().await {
                        tracing::warn!(
                            "Deferred cleanup of {} sandbox failed: {}",
                            sandbox.kind(),
                            e
                        );
                    }
                });
            }
            Err(_) => tracing::warn!(
                "{} sandbox dropped outside a runtime; cleanup skipped",
                sandbox.kind()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandboxError;
    use crate::models::SandboxKind;
    use crate::sandbox::MockSandbox;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn mock(init_ok: bool, cleaned: mpsc::UnboundedSender<()>) -> Arc<dyn Sandbox> {
        let mut mock = MockSandbox::new();
        mock.expect_initialize().returning(move || {
            if init_ok {
                Ok(())
            } else {
                Err(SandboxError::InitializationFailed("no daemon".into()))
            }
        });
        mock.expect_kind().return_const(SandboxKind::Container);
        mock.expect_is_initialized().return_const(init_ok);
        mock.expect_cleanup().times(1).returning(move || {
            let _ = cleaned.send(());
            Ok(())
        });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_release_cleans_up() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = SandboxGuard::acquire(mock(true, tx)).await.unwrap();
        assert!(guard.is_initialized());
        assert_eq!(guard.kind(), SandboxKind::Container);
        guard.release().await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_drop_schedules_cleanup() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let _guard = SandboxGuard::acquire(mock(true, tx)).await.unwrap();
        }
        let cleaned = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(cleaned, Ok(Some(()))));
    }

    #[tokio::test]
    async fn test_failed_initialize_still_cleans_up() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(SandboxGuard::acquire(mock(false, tx)).await.is_err());
        assert!(rx.try_recv().is_ok());
    }
}
