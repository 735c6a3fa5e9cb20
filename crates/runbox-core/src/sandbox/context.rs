//! Shared collaborators handed to every sandbox

use crate::cleanup::{ContainerRegistry, TempFileManager};
use crate::config::SandboxConfig;
use crate::logging::{AuditLog, ExecutionLogger};
use std::sync::Arc;

/// Explicitly constructed dependencies of a sandbox.
///
/// Cloning is cheap; clones share the same workspace and container registries,
/// so one context can back several concurrent sandboxes. Entries are tagged
/// with their sandbox's [`OwnerId`](crate::cleanup::OwnerId) and each sandbox
/// only reclaims its own.
#[derive(Debug, Clone)]
pub struct SandboxContext {
    pub temp_files: Arc<TempFileManager>,
    pub containers: Arc<ContainerRegistry>,
    pub logger: ExecutionLogger,
    pub audit: Option<Arc<AuditLog>>,
}

impl SandboxContext {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            temp_files: Arc::new(TempFileManager::new(config.temp_dir.clone())),
            containers: Arc::new(ContainerRegistry::new()),
            logger: ExecutionLogger::new(),
            audit: config
                .audit_log
                .as_ref()
                .map(|path| Arc::new(AuditLog::new(path.clone()))),
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }
}
