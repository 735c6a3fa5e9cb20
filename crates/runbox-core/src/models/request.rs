//! Execution request

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default wall-clock timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default memory limit (512 MiB)
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;

/// Guest language of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }

    /// File extension used for the guest script
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// How much of the host filesystem the guest may see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemAccess {
    /// Only the throwaway workspace, read-only
    None,
    /// Workspace plus a writable scratch area
    #[default]
    Restricted,
    /// Caller-supplied working directory
    Full,
}

/// Immutable description of one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Script source
    pub code: String,

    /// Guest language
    #[serde(default)]
    pub language: Language,

    /// Wall-clock timeout in seconds (clamped before use)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Memory limit in bytes (clamped before use)
    #[serde(default = "default_memory")]
    pub memory_limit: u64,

    /// Working directory, honoured only with `FilesystemAccess::Full`
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for the guest
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Data fed to the guest's stdin
    #[serde(default)]
    pub input_data: Option<String>,

    /// Whether the guest may reach the network
    #[serde(default)]
    pub network_enabled: bool,

    #[serde(default)]
    pub filesystem_access: FilesystemAccess,

    /// Caller identity recorded in the audit log
    #[serde(default)]
    pub actor: Option<String>,

    /// Session identity recorded in the audit log
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_memory() -> u64 {
    DEFAULT_MEMORY_LIMIT
}

impl ExecutionRequest {
    /// Create a Python request with default limits
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: Language::Python,
            timeout: DEFAULT_TIMEOUT_SECS,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            working_dir: None,
            env_vars: HashMap::new(),
            input_data: None,
            network_enabled: false,
            filesystem_access: FilesystemAccess::default(),
            actor: None,
            session_id: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input_data = Some(input.into());
        self
    }

    pub fn with_network(mut self, enabled: bool) -> Self {
        self.network_enabled = enabled;
        self
    }

    pub fn with_filesystem_access(mut self, access: FilesystemAccess) -> Self {
        self.filesystem_access = access;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Attach caller identity for auditing
    pub fn with_identity(
        mut self,
        actor: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        self.actor = Some(actor.into());
        self.session_id = Some(session_id.into());
        self
    }

    /// First `max_chars` characters of the code on a single line
    pub fn code_preview(&self, max_chars: usize) -> String {
        let flattened: String = self
            .code
            .chars()
            .take(max_chars)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if self.code.chars().count() > max_chars {
            format!("{}...", flattened)
        } else {
            flattened
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ExecutionRequest::new("print(1)");
        assert_eq!(request.language, Language::Python);
        assert_eq!(request.timeout, 30);
        assert_eq!(request.memory_limit, 512 * 1024 * 1024);
        assert!(!request.network_enabled);
        assert_eq!(request.filesystem_access, FilesystemAccess::Restricted);
    }

    #[test]
    fn test_request_builder() {
        let request = ExecutionRequest::new("print(1)")
            .with_timeout(5)
            .with_memory_limit(64 * 1024 * 1024)
            .with_env("MODE", "test")
            .with_input("42\n")
            .with_network(true)
            .with_identity("agent-7", "sess-1");

        assert_eq!(request.timeout, 5);
        assert_eq!(request.env_vars.get("MODE").map(String::as_str), Some("test"));
        assert_eq!(request.input_data.as_deref(), Some("42\n"));
        assert!(request.network_enabled);
        assert_eq!(request.actor.as_deref(), Some("agent-7"));
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("Python3".parse::<Language>(), Ok(Language::Python));
        assert!("ruby".parse::<Language>().is_err());
    }

    #[test]
    fn test_code_preview() {
        let request = ExecutionRequest::new("a = 1\nb = 2\nprint(a + b)");
        assert_eq!(request.code_preview(5), "a = 1...");
        assert_eq!(request.code_preview(100), "a = 1 b = 2 print(a + b)");
    }

    #[test]
    fn test_request_deserialize_fills_defaults() {
        let request: ExecutionRequest = serde_json::from_str(r#"{"code": "x = 1"}"#).unwrap();
        assert_eq!(request.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(request.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert!(request.env_vars.is_empty());
    }
}
