//! Types produced by the security checker

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule family that produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A blocked regular expression matched the source text
    Pattern,
    /// An import outside the allow-list
    Import,
    /// A call to a blocked built-in
    Call,
    /// A blocked method or escape-hatch attribute
    Attribute,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Pattern => "pattern",
            RuleKind::Import => "import",
            RuleKind::Call => "call",
            RuleKind::Attribute => "attribute",
        }
    }
}

/// One static-analysis finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleKind,
    /// What was triggered and why
    pub message: String,
    /// 1-based source line, when known
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(rule: RuleKind, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of checking one script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub safe: bool,
    pub violations: Vec<Violation>,
}

impl SecurityReport {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            safe: violations.is_empty(),
            violations,
        }
    }

    /// All violations joined into a single message
    pub fn message(&self) -> String {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        format!("Security violations detected: {}", parts.join("; "))
    }

    pub fn count_by(&self, rule: RuleKind) -> usize {
        self.violations.iter().filter(|v| v.rule == rule).count()
    }
}

/// 1-based line containing byte `offset` of `source`
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}
