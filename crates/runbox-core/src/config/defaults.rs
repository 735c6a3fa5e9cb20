//! Default security policy lists.
//!
//! These are a starting policy surface; every list can be replaced or extended
//! through `SandboxConfig`.

/// Modules guest code may import
pub fn default_allowed_imports() -> Vec<String> {
    [
        // Numbers and math
        "math",
        "cmath",
        "decimal",
        "fractions",
        "random",
        "statistics",
        "numbers",
        // Text
        "string",
        "re",
        "textwrap",
        "unicodedata",
        "difflib",
        // Data structures and functional helpers
        "collections",
        "heapq",
        "bisect",
        "array",
        "itertools",
        "functools",
        "operator",
        "copy",
        "dataclasses",
        "enum",
        "typing",
        "abc",
        // Data formats
        "json",
        "csv",
        "base64",
        "hashlib",
        "struct",
        // Time
        "datetime",
        "time",
        "calendar",
        "zoneinfo",
        // Approved data-processing libraries
        "numpy",
        "pandas",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Modules pre-imported into the restricted local namespace
pub fn preloaded_modules() -> Vec<String> {
    [
        "math",
        "json",
        "re",
        "datetime",
        "random",
        "collections",
        "itertools",
        "functools",
        "statistics",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Regular expressions whose single match rejects a script
pub fn default_blocked_patterns() -> Vec<String> {
    [
        // Process spawning and raw OS command execution
        r"\bsubprocess\s*\.",
        r"\bos\s*\.\s*(system|popen|exec\w*|spawn\w*|fork\w*|kill\w*)\b",
        r"\bpty\s*\.\s*spawn\b",
        // Dynamic evaluation and compilation
        r"(?:^|[^.\w])eval\s*\(",
        r"(?:^|[^.\w])exec\s*\(",
        r"(?:^|[^.\w])compile\s*\(",
        // Dynamic import machinery
        r"__import__",
        r"\bimportlib\b",
        // Raw file open
        r"(?:^|[^.\w])open\s*\(",
        r"\bio\s*\.\s*open\b",
        // Network primitives and HTTP clients
        r"\bsocket\s*\.",
        r"\brequests\s*\.",
        r"\burllib\b",
        r"\bhttp\s*\.\s*client\b",
        r"\bhttpx\b",
        r"\baiohttp\b",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Built-in functions that may not be called
pub fn default_blocked_calls() -> Vec<String> {
    [
        "eval",
        "exec",
        "compile",
        "__import__",
        "open",
        "input",
        "breakpoint",
        "globals",
        "vars",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Method names that spawn or replace processes
pub fn default_blocked_attributes() -> Vec<String> {
    [
        "system",
        "popen",
        "spawn",
        "spawnl",
        "spawnv",
        "spawnve",
        "fork",
        "forkpty",
        "execv",
        "execve",
        "execl",
        "execlp",
        "execvp",
        "Popen",
        "check_output",
        "getoutput",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Attributes that open introspection escape hatches
pub fn default_blocked_dunders() -> Vec<String> {
    [
        "__subclasses__",
        "__globals__",
        "__builtins__",
        "__code__",
        "__bases__",
        "__mro__",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_compile() {
        for pattern in default_blocked_patterns() {
            assert!(regex::Regex::new(&pattern).is_ok(), "bad pattern {}", pattern);
        }
    }

    #[test]
    fn test_preloaded_are_allowed() {
        let allowed = default_allowed_imports();
        for module in preloaded_modules() {
            assert!(allowed.contains(&module), "{} is preloaded but not allowed", module);
        }
    }

    #[test]
    fn test_dangerous_modules_not_allowed() {
        let allowed = default_allowed_imports();
        for module in ["os", "sys", "subprocess", "socket", "shutil", "importlib"] {
            assert!(!allowed.iter().any(|m| m == module));
        }
    }
}
