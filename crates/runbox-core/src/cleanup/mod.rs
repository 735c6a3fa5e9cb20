//! Resource reclamation.
//!
//! Workspaces and containers are released synchronously at the end of every
//! run; [`CleanupScheduler`] additionally sweeps anything a crashed process
//! left behind.

mod containers;
mod scheduler;
mod temp_files;

pub use containers::{ContainerCleanup, ContainerRegistry, MANAGED_LABEL, RUN_ID_LABEL};
pub use scheduler::CleanupScheduler;
pub use temp_files::{TempFileManager, Workspace};

use std::fmt;
use uuid::Uuid;

/// Identity of the sandbox that owns a workspace or container.
///
/// Registries are shared through [`SandboxContext`](crate::sandbox::SandboxContext);
/// a sandbox only ever reclaims entries carrying its own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
