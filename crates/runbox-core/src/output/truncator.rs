//! Output bounding

/// Appended to text cut by [`truncate_output`] and [`truncate_head`]
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Keep at most `max_chars` characters (UTF-8 safe)
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Bound `text` to `max_chars` plus the marker.
///
/// Text that already carries the marker over a head within the bound is
/// returned unchanged, so the function is idempotent.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    if let Some(head) = text.strip_suffix(TRUNCATION_MARKER) {
        if head.chars().count() <= max_chars {
            return text.to_string();
        }
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    format!("{}{}", truncate_str(text, max_chars), TRUNCATION_MARKER)
}

/// Keep the first `max_lines` lines, then the first `max_chars` characters
pub fn truncate_head(text: &str, max_lines: usize, max_chars: usize) -> String {
    let total_lines = text.lines().count();
    let mut truncated = false;

    let mut kept = if total_lines > max_lines {
        truncated = true;
        text.lines().take(max_lines).collect::<Vec<_>>().join("\n")
    } else {
        text.to_string()
    };

    if kept.chars().count() > max_chars {
        truncated = true;
        kept = truncate_str(&kept, max_chars).to_string();
    }

    if truncated {
        kept.push_str(TRUNCATION_MARKER);
    }
    kept
}

/// Result of [`smart_truncate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartTruncation {
    pub text: String,
    pub omitted_chars: usize,
}

impl SmartTruncation {
    pub fn was_truncated(&self) -> bool {
        self.omitted_chars > 0
    }
}

/// Keep a head and a tail window of `max_chars` in total around an elided middle
pub fn smart_truncate(text: &str, max_chars: usize) -> SmartTruncation {
    let total = text.chars().count();
    if total <= max_chars {
        return SmartTruncation {
            text: text.to_string(),
            omitted_chars: 0,
        };
    }

    let head_len = max_chars / 2;
    let tail_len = max_chars - head_len;
    let omitted = total - head_len - tail_len;

    let head = truncate_str(text, head_len);
    let tail: String = text.chars().skip(total - tail_len).collect();

    SmartTruncation {
        text: format!(
            "{}\n... [{} characters omitted] ...\n{}",
            head, omitted, tail
        ),
        omitted_chars: omitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_utf8() {
        assert_eq!(truncate_str("héllo", 2), "hé");
        assert_eq!(truncate_str("日本語", 5), "日本語");
    }

    #[test]
    fn test_truncate_output_bounds_length() {
        let text = "a".repeat(100);
        let out = truncate_output(&text, 10);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.chars().count(), 10 + TRUNCATION_MARKER.chars().count());
        assert_eq!(truncate_output("short", 10), "short");
    }

    #[test]
    fn test_truncate_output_idempotent() {
        let once = truncate_output(&"line\n".repeat(50), 32);
        assert_eq!(truncate_output(&once, 32), once);
    }

    #[test]
    fn test_truncate_head_by_lines_then_chars() {
        let text = "1\n2\n3\n4\n5";
        assert_eq!(truncate_head(text, 2, 100), format!("1\n2{}", TRUNCATION_MARKER));
        assert_eq!(truncate_head("abcdef", 10, 3), format!("abc{}", TRUNCATION_MARKER));
        assert_eq!(truncate_head(text, 10, 100), text);
    }

    #[test]
    fn test_smart_truncate_keeps_head_and_tail() {
        let text = format!("{}{}{}", "H".repeat(10), "m".repeat(80), "T".repeat(10));
        let cut = smart_truncate(&text, 20);
        assert!(cut.was_truncated());
        assert_eq!(cut.omitted_chars, 80);
        assert!(cut.text.starts_with("HHHHHHHHHH\n"));
        assert!(cut.text.ends_with("\nTTTTTTTTTT"));
        assert!(cut.text.contains("[80 characters omitted]"));
    }

    #[test]
    fn test_smart_truncate_short_text() {
        let cut = smart_truncate("tiny", 20);
        assert!(!cut.was_truncated());
        assert_eq!(cut.text, "tiny");
    }
}
