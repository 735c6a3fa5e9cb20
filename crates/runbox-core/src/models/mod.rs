//! Data model shared by every component

mod phase;
mod request;
mod result;

pub use phase::ExecutionPhase;
pub use request::{
    DEFAULT_MEMORY_LIMIT, DEFAULT_TIMEOUT_SECS, ExecutionRequest, FilesystemAccess, Language,
};
pub use result::{ExecutionResult, ExecutionStatus, ExecutionTiming, SandboxKind};
