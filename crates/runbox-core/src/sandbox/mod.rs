//! Isolation backends and their shared execution pipeline.
//!
//! Every backend implements [`Sandbox`]. Callers normally obtain one through
//! [`SandboxFactory`] and hold it inside a [`SandboxGuard`] or
//! [`SandboxFactory::scoped`] so cleanup always runs.

mod container;
mod context;
mod factory;
mod guard;
pub mod harness;
mod local;
mod outcome;
mod pipeline;

pub use container::ContainerSandbox;
pub use context::SandboxContext;
pub use factory::{SandboxConstructor, SandboxFactory};
pub use guard::SandboxGuard;
pub use local::LocalSandbox;
pub use outcome::{RunOutcome, SIGKILL_EXIT_CODE, Termination, finalize};
pub use pipeline::Pipeline;

use crate::error::SandboxResult;
use crate::models::{ExecutionRequest, ExecutionResult, SandboxKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Capability set shared by all isolation backends.
///
/// `execute` never fails: every fault of the guest or of the backend itself
/// is reported as a terminal [`ExecutionResult`]. A backend that was not
/// initialized explicitly initializes itself on first use.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sandbox: Send + Sync {
    fn kind(&self) -> SandboxKind;

    /// Acquire backend resources (interpreter probe, daemon connection, image)
    async fn initialize(&self) -> SandboxResult<()>;

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Execute, aborting with `Cancelled` once `cancel` fires
    async fn execute_cancellable(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionResult;

    /// Release everything acquired by `initialize` and by past runs
    async fn cleanup(&self) -> SandboxResult<()>;

    /// Whether the backend can currently accept work
    async fn health_check(&self) -> bool;

    fn is_initialized(&self) -> bool;
}
