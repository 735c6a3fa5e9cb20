//! Backend registry: name → constructor

use super::container::ContainerSandbox;
use super::context::SandboxContext;
use super::local::LocalSandbox;
use super::Sandbox;
use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Builds a sandbox bound to a configuration and context
pub type SandboxConstructor =
    fn(Arc<SandboxConfig>, SandboxContext) -> SandboxResult<Arc<dyn Sandbox>>;

/// Registration table of available backends
#[derive(Clone)]
pub struct SandboxFactory {
    constructors: BTreeMap<String, SandboxConstructor>,
}

impl SandboxFactory {
    /// Factory with the built-in backends: `local`, `container` and its alias `docker`
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register("local", build_local);
        factory.register("container", build_container);
        factory.register("docker", build_container);
        factory
    }

    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Add or replace a backend; names are case-insensitive
    pub fn register(&mut self, name: &str, constructor: SandboxConstructor) {
        self.constructors.insert(name.to_lowercase(), constructor);
    }

    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    pub fn supports(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Construct an uninitialized sandbox
    pub fn create(
        &self,
        name: &str,
        config: Arc<SandboxConfig>,
        context: SandboxContext,
    ) -> SandboxResult<Arc<dyn Sandbox>> {
        let constructor = self
            .constructors
            .get(&name.to_lowercase())
            .ok_or_else(|| SandboxError::UnknownBackend(name.to_string()))?;
        tracing::debug!("Creating {} sandbox", name);
        constructor(config, context)
    }

    /// Create and initialize a sandbox, run `f`, then clean up.
    ///
    /// Cleanup runs whether `f` returns normally or panics; a panic is
    /// resumed after cleanup.
    pub async fn scoped<F, Fut, T>(
        &self,
        name: &str,
        config: Arc<SandboxConfig>,
        context: SandboxContext,
        f: F,
    ) -> SandboxResult<T>
    where
        F: FnOnce(Arc<dyn Sandbox>) -> Fut,
        Fut: Future<Output = T>,
    {
        let sandbox = self.create(name, config, context)?;
        if let Err(e) = sandbox.initialize().await {
            release(sandbox.as_ref()).await;
            return Err(e);
        }

        let outcome = AssertUnwindSafe(f(Arc::clone(&sandbox)))
            .catch_unwind()
            .await;
        release(sandbox.as_ref()).await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Default for SandboxFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SandboxFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxFactory")
            .field("backends", &self.names())
            .finish()
    }
}

async fn release(sandbox: &dyn Sandbox) {
    if let Err(e) = sandbox.cleanup().await {
        tracing::warn!("Cleanup of {} sandbox failed: {}", sandbox.kind(), e);
    }
}

fn build_local(
    config: Arc<SandboxConfig>,
    context: SandboxContext,
) -> SandboxResult<Arc<dyn Sandbox>> {
    Ok(Arc::new(LocalSandbox::new(config, context)?))
}

fn build_container(
    config: Arc<SandboxConfig>,
    context: SandboxContext,
) -> SandboxResult<Arc<dyn Sandbox>> {
    Ok(Arc::new(ContainerSandbox::new(config, context)?))
}
