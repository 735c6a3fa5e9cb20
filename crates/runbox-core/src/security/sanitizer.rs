//! Secret redaction for captured output

use regex::Regex;
use std::sync::LazyLock;

/// Replacement written over secret values
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// `key = value` / `key: value` assignments whose key names a credential.
/// Values beginning with `[` are skipped so redacted text is left alone.
static ASSIGNMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)([\w-]*(?:api[_-]?key|access[_-]?key|password|passwd|secret|token)[\w-]*)(\s*[:=]\s*["']?)([^\s"',;\[][^\s"',;]*)"#,
    )
    .expect("assignment pattern is valid")
});

/// Bare credentials recognisable by their shape
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-ant-[a-zA-Z0-9\-_]{20,}",
        r"sk-[a-zA-Z0-9]{20,}",
        r"ghp_[a-zA-Z0-9]{36}",
        r"github_pat_[a-zA-Z0-9_]{22,}",
        r"AKIA[0-9A-Z]{16}",
        r"eyJ[a-zA-Z0-9_\-]+\.eyJ[a-zA-Z0-9_\-]+\.[a-zA-Z0-9_\-]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("token pattern is valid"))
    .collect()
});

/// Replace every secret-looking value in `text` with [`REDACTION_MARKER`]
pub fn redact_secrets(text: &str) -> String {
    let mut clean = ASSIGNMENT_PATTERN
        .replace_all(text, format!("${{1}}${{2}}{}", REDACTION_MARKER).as_str())
        .into_owned();
    for re in TOKEN_PATTERNS.iter() {
        if re.is_match(&clean) {
            clean = re.replace_all(&clean, REDACTION_MARKER).into_owned();
        }
    }
    clean
}

/// Whether `text` contains anything [`redact_secrets`] would replace
pub fn contains_secret(text: &str) -> bool {
    ASSIGNMENT_PATTERN.is_match(text) || TOKEN_PATTERNS.iter().any(|re| re.is_match(text))
}
