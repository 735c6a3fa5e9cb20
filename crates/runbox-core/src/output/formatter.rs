//! Result rendering for different consumers

use super::truncator::smart_truncate;
use crate::classifier::{Classification, classify};
use crate::error::SandboxResult;
use crate::models::{ExecutionResult, ExecutionStatus};
use serde_json::Value;
use std::fmt::Write;

/// Status glyph, distinct per terminal status
pub fn status_glyph(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Success => "✓",
        ExecutionStatus::Error => "✗",
        ExecutionStatus::Timeout => "⏱",
        ExecutionStatus::MemoryExceeded => "⚠",
        ExecutionStatus::SecurityViolation => "⛔",
        ExecutionStatus::Cancelled => "⊘",
    }
}

/// Render a byte count with a binary unit
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Stateless renderer for [`ExecutionResult`]
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    verbose: bool,
    use_colors: bool,
    /// Output budget for the LLM context blob
    context_chars: usize,
}

impl ResultFormatter {
    pub fn new() -> Self {
        Self {
            verbose: false,
            use_colors: false,
            context_chars: 4_000,
        }
    }

    /// Include the metrics section in text output
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn with_colors(mut self) -> Self {
        self.use_colors = true;
        self
    }

    pub fn with_context_chars(mut self, chars: usize) -> Self {
        self.context_chars = chars;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn classification(result: &ExecutionResult) -> Option<Classification> {
        match (result.status, result.error.as_deref()) {
            (ExecutionStatus::Error, Some(error)) => Some(classify(error)),
            _ => None,
        }
    }

    /// Annotated plain text with a status glyph
    pub fn to_text(&self, result: &ExecutionResult) -> String {
        let color = if result.is_success() { "32" } else { "31" };
        let mut out = self.colorize(
            &format!(
                "{} {} ({})",
                status_glyph(result.status),
                result.status.as_str().to_uppercase(),
                result.sandbox_type
            ),
            color,
        );
        out.push('\n');

        if !result.output.is_empty() {
            out.push_str(&result.output);
            if !result.output.ends_with('\n') {
                out.push('\n');
            }
        }
        if let Some(value) = &result.return_value {
            let _ = writeln!(out, "=> {}", value);
        }
        if let Some(error) = &result.error {
            match Self::classification(result) {
                Some(c) => {
                    let _ = writeln!(out, "Error [{}]: {}", c.kind, error);
                    if let Some(hint) = c.suggestion {
                        let _ = writeln!(out, "Suggestion: {}", hint);
                    }
                }
                None => {
                    let _ = writeln!(out, "Error: {}", error);
                }
            }
        }

        if self.verbose {
            out.push_str("--- metrics ---\n");
            let _ = writeln!(out, "Execution time: {:.3}s", result.execution_time);
            let _ = writeln!(out, "Memory used: {}", human_bytes(result.memory_used));
            let _ = writeln!(out, "Exit code: {}", result.exit_code);
            let _ = writeln!(out, "Started: {}", result.started_at.to_rfc3339());
            let _ = writeln!(out, "Finished: {}", result.finished_at.to_rfc3339());
        }
        out
    }

    /// Markdown with a fenced output block and a metrics table
    pub fn to_markdown(&self, result: &ExecutionResult) -> String {
        let mut out = format!(
            "### {} Execution {}\n\n",
            status_glyph(result.status),
            result.status
        );

        if !result.output.is_empty() {
            let _ = write!(out, "**Output**\n\n```text\n{}\n```\n\n", result.output.trim_end());
        }
        if let Some(value) = &result.return_value {
            let _ = write!(out, "**Return value**: `{}`\n\n", value);
        }
        if let Some(error) = &result.error {
            match Self::classification(result) {
                Some(c) => {
                    let _ = write!(out, "**Error** (`{}`): {}\n\n", c.kind, error.trim_end());
                    if let Some(hint) = c.suggestion {
                        let _ = write!(out, "> {}\n\n", hint);
                    }
                }
                None => {
                    let _ = write!(out, "**Error**: {}\n\n", error.trim_end());
                }
            }
        }

        out.push_str("| Metric | Value |\n|---|---|\n");
        let _ = writeln!(out, "| Status | {} |", result.status);
        let _ = writeln!(out, "| Backend | {} |", result.sandbox_type);
        let _ = writeln!(out, "| Execution time | {:.3} s |", result.execution_time);
        let _ = writeln!(out, "| Memory used | {} |", human_bytes(result.memory_used));
        let _ = writeln!(out, "| Exit code | {} |", result.exit_code);
        out
    }

    /// Flat map for JSON transport; deserializes back into [`ExecutionResult`]
    pub fn to_json(&self, result: &ExecutionResult) -> SandboxResult<Value> {
        let mut value = serde_json::to_value(result)?;
        if let (Some(c), Value::Object(map)) = (Self::classification(result), &mut value) {
            map.insert("error_kind".into(), Value::from(c.kind.as_str()));
            map.insert("error_description".into(), Value::from(c.description));
            if let Some(hint) = c.suggestion {
                map.insert("error_suggestion".into(), Value::from(hint));
            }
        }
        Ok(value)
    }

    /// Condensed natural-language summary for feeding back into an LLM
    pub fn to_llm_context(&self, result: &ExecutionResult) -> String {
        let output = smart_truncate(&result.output, self.context_chars);
        let mut out = String::new();

        match result.status {
            ExecutionStatus::Success => {
                let _ = writeln!(
                    out,
                    "Code executed successfully in {:.2}s.",
                    result.execution_time
                );
                if output.text.is_empty() {
                    out.push_str("It produced no output.\n");
                } else {
                    let _ = writeln!(out, "Output:\n{}", output.text.trim_end());
                }
                if let Some(value) = &result.return_value {
                    let _ = writeln!(out, "Return value: {}", value);
                }
            }
            ExecutionStatus::SecurityViolation => {
                let _ = writeln!(
                    out,
                    "Code was rejected before running. {}",
                    result.error.as_deref().unwrap_or_default()
                );
                out.push_str("Rewrite the code without the blocked imports or calls.\n");
            }
            status => {
                let _ = writeln!(
                    out,
                    "Code execution failed ({}) after {:.2}s.",
                    status, result.execution_time
                );
                if let Some(c) = Self::classification(result) {
                    let _ = writeln!(out, "Error kind: {} ({})", c.kind, c.description);
                    if let Some(error) = &result.error {
                        let _ = writeln!(out, "Error: {}", error.trim_end());
                    }
                    if let Some(hint) = c.suggestion {
                        let _ = writeln!(out, "Suggestion: {}", hint);
                    }
                } else if let Some(error) = &result.error {
                    let _ = writeln!(out, "Error: {}", error.trim_end());
                }
                if !output.text.is_empty() {
                    let _ = writeln!(
                        out,
                        "Partial output before the failure:\n{}",
                        output.text.trim_end()
                    );
                }
            }
        }
        out
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new()
    }
}
