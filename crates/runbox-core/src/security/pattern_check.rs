//! Regular-expression pass over the raw source text.
//!
//! Any single match rejects the script. Patterns are compiled in multi-line
//! mode so `^` anchors at every line start.

use super::types::{RuleKind, Violation, line_of};
use crate::error::{SandboxError, SandboxResult};
use regex::{Regex, RegexBuilder};

/// Compiled blocked-pattern list
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<(String, Regex)>,
}

impl PatternSet {
    /// Compile `patterns`, failing on the first invalid expression
    pub fn compile(patterns: &[String]) -> SandboxResult<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .multi_line(true)
                    .build()
                    .map(|re| (pattern.clone(), re))
                    .map_err(|source| SandboxError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<SandboxResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// One violation per pattern that matches, reported at its first match
    pub fn scan(&self, code: &str) -> Vec<Violation> {
        self.patterns
            .iter()
            .filter_map(|(pattern, re)| {
                let found = re.find(code)?;
                let snippet = found.as_str().trim();
                Some(
                    Violation::new(
                        RuleKind::Pattern,
                        format!("Blocked pattern '{}' matched '{}'", pattern, snippet),
                    )
                    .at_line(line_of(code, found.start())),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_blocked_patterns;

    fn defaults() -> PatternSet {
        PatternSet::compile(&default_blocked_patterns()).unwrap()
    }

    #[test]
    fn test_blocks_process_spawning() {
        let violations = defaults().scan("import math\nsubprocess.run(['ls'])");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, Some(2));
        assert_eq!(violations[0].rule, RuleKind::Pattern);
    }

    #[test]
    fn test_blocks_os_system_and_eval() {
        let set = defaults();
        assert!(!set.scan("os.system('rm -rf /')").is_empty());
        assert!(!set.scan("x = eval('1 + 1')").is_empty());
        assert!(!set.scan("exec(code)").is_empty());
        assert!(!set.scan("f = open('/etc/passwd')").is_empty());
        assert!(!set.scan("__import__('os')").is_empty());
        assert!(!set.scan("requests.get('http://x')").is_empty());
    }

    #[test]
    fn test_method_names_do_not_trip_builtin_patterns() {
        let set = defaults();
        assert!(set.scan("pattern = re.compile(r'\\d+')").is_empty());
        assert!(set.scan("df.eval('a + b')").is_empty());
        assert!(set.scan("print(sum([1, 2, 3]))").is_empty());
        assert!(set.scan("evaluate(x)").is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PatternSet::compile(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPattern { .. }));
    }
}
