//! Static security checks run before any guest code executes.
//!
//! Two independent passes must both come back clean:
//! - a regular-expression scan of the raw text ([`PatternSet`])
//! - a syntax-tree walk against import, call and attribute policy ([`AstPolicy`])
//!
//! The checker also owns post-execution output sanitization.

mod ast_check;
mod pattern_check;
mod sanitizer;
mod types;

pub use ast_check::AstPolicy;
pub use pattern_check::PatternSet;
pub use sanitizer::{REDACTION_MARKER, contains_secret, redact_secrets};
pub use types::{RuleKind, SecurityReport, Violation};

use crate::config::SandboxConfig;
use crate::error::SandboxResult;
use crate::output::truncate_output;

/// Pattern and syntax-tree checker bound to one configuration
#[derive(Debug, Clone)]
pub struct SecurityChecker {
    patterns: PatternSet,
    policy: AstPolicy,
    max_output_size: usize,
}

impl SecurityChecker {
    /// Compile the configured policy; fails if a blocked pattern is invalid
    pub fn new(config: &SandboxConfig) -> SandboxResult<Self> {
        Ok(Self {
            patterns: PatternSet::compile(&config.blocked_patterns)?,
            policy: AstPolicy::from_config(config),
            max_output_size: config.max_output_size,
        })
    }

    /// Run both passes over `code`. Never executes anything.
    pub fn check(&self, code: &str) -> SecurityReport {
        let mut violations = self.patterns.scan(code);

        match self.policy.check(code) {
            Ok(found) => violations.extend(found),
            Err(e) => {
                tracing::debug!("Skipping syntax-tree pass, code does not parse: {}", e);
            }
        }

        violations.sort_by_key(|v| v.line.unwrap_or(0));
        let report = SecurityReport::from_violations(violations);
        if !report.safe {
            tracing::warn!(
                violations = report.violations.len(),
                "Code rejected by security check"
            );
        }
        report
    }

    /// Redact secrets, then bound the length with a truncation marker.
    /// Applying it to its own output changes nothing.
    pub fn sanitize_output(&self, text: &str) -> String {
        truncate_output(&redact_secrets(text), self.max_output_size)
    }

    pub fn max_output_size(&self) -> usize {
        self.max_output_size
    }
}
