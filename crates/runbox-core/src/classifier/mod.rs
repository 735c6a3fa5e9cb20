//! Guest fault classification.
//!
//! Maps raw fault text to a closed set of kinds with a description and an
//! optional remediation hint. Purely advisory: it never changes the status a
//! backend assigned.

mod tables;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of guest fault kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SyntaxError,
    IndentationError,
    NameError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    AttributeError,
    ImportError,
    ModuleNotFound,
    ZeroDivision,
    FileNotFound,
    PermissionDenied,
    MemoryError,
    RecursionError,
    RuntimeError,
    #[serde(rename = "unknown_error")]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax_error",
            Self::IndentationError => "indentation_error",
            Self::NameError => "name_error",
            Self::TypeError => "type_error",
            Self::ValueError => "value_error",
            Self::KeyError => "key_error",
            Self::IndexError => "index_error",
            Self::AttributeError => "attribute_error",
            Self::ImportError => "import_error",
            Self::ModuleNotFound => "module_not_found",
            Self::ZeroDivision => "zero_division",
            Self::FileNotFound => "file_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::MemoryError => "memory_error",
            Self::RecursionError => "recursion_error",
            Self::RuntimeError => "runtime_error",
            Self::Unknown => "unknown_error",
        }
    }

    pub fn description(&self) -> &'static str {
        tables::description(*self)
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        tables::suggestion(*self)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ErrorKind,
    pub description: &'static str,
    pub suggestion: Option<&'static str>,
}

impl From<ErrorKind> for Classification {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            description: kind.description(),
            suggestion: kind.suggestion(),
        }
    }
}

/// Classify raw fault text.
///
/// The exception type at the start of the last non-empty line wins; otherwise
/// the text is scanned for well-known substrings, most specific first.
pub fn classify(raw: &str) -> Classification {
    classify_kind(raw).into()
}

fn classify_kind(raw: &str) -> ErrorKind {
    if let Some(last) = raw.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        let head = last.split(':').next().unwrap_or(last).trim();
        let name = head.rsplit('.').next().unwrap_or(head);
        if let Some((_, kind)) = tables::TYPE_NAMES.iter().find(|(n, _)| *n == name) {
            return *kind;
        }
    }

    let lower = raw.to_lowercase();
    tables::NEEDLES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_type_names() {
        assert_eq!(classify("ZeroDivisionError: division by zero").kind, ErrorKind::ZeroDivision);
        assert_eq!(
            classify("ModuleNotFoundError: No module named 'foo'").kind,
            ErrorKind::ModuleNotFound
        );
        assert_eq!(classify("KeyError: 'missing'").kind, ErrorKind::KeyError);
        assert_eq!(classify("MemoryError").kind, ErrorKind::MemoryError);
    }

    #[test]
    fn test_last_line_of_traceback_wins() {
        let raw = "Traceback (most recent call last):\n  File \"main.py\", line 1, in <module>\n    \
                   x = 1 / 0\nZeroDivisionError: division by zero\n";
        assert_eq!(classify(raw).kind, ErrorKind::ZeroDivision);
    }

    #[test]
    fn test_syntax_error_variants() {
        let raw = "  File \"main.py\", line 1\n    print('hello'\n         ^\n\
                   SyntaxError: '(' was never closed";
        assert_eq!(classify(raw).kind, ErrorKind::SyntaxError);
        assert_eq!(
            classify("IndentationError: unexpected indent").kind,
            ErrorKind::IndentationError
        );
    }

    #[test]
    fn test_substring_fallback() {
        assert_eq!(
            classify("fatal: maximum recursion depth exceeded while calling").kind,
            ErrorKind::RecursionError
        );
        assert_eq!(classify("something: division by zero").kind, ErrorKind::ZeroDivision);
        assert_eq!(
            classify("Import of module 'os' is not allowed in this sandbox").kind,
            ErrorKind::ImportError
        );
    }

    #[test]
    fn test_unknown() {
        let c = classify("the spanner is in the works");
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.kind.as_str(), "unknown_error");
        assert!(c.suggestion.is_none());
    }

    #[test]
    fn test_suggestions() {
        let c = classify("RecursionError: maximum recursion depth exceeded");
        assert!(c.suggestion.unwrap().contains("base case"));
        assert!(!c.description.is_empty());
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for kind in [ErrorKind::ZeroDivision, ErrorKind::ModuleNotFound, ErrorKind::Unknown] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
