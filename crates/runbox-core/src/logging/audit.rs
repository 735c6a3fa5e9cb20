//! Append-only JSONL audit log

use crate::error::SandboxResult;
use crate::models::{ExecutionRequest, ExecutionResult, ExecutionStatus, SandboxKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Option<String>,
    pub session_id: Option<String>,
    /// Hex SHA-256 of the submitted code
    pub code_hash: String,
    pub status: ExecutionStatus,
    pub security_violation: bool,
    pub backend: SandboxKind,
}

impl AuditEntry {
    pub fn new(request: &ExecutionRequest, result: &ExecutionResult) -> Self {
        Self {
            timestamp: result.finished_at,
            actor: request.actor.clone(),
            session_id: request.session_id.clone(),
            code_hash: hash_code(&request.code),
            status: result.status,
            security_violation: result.status == ExecutionStatus::SecurityViolation,
            backend: result.sandbox_type,
        }
    }
}

pub fn hash_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Appends one JSON object per line; concurrent writers are serialized
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &AuditEntry) -> SandboxResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Record an execution; failures are logged, never propagated
    pub async fn record(&self, request: &ExecutionRequest, result: &ExecutionResult) {
        if let Err(e) = self.append(&AuditEntry::new(request, result)).await {
            tracing::warn!("Failed to write audit entry to {}: {}", self.path.display(), e);
        }
    }

    /// Read every entry back
    pub async fn entries(&self) -> SandboxResult<Vec<AuditEntry>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}
