/// Default number of lines in a snippet when no match is found.
pub const DEFAULT_SNIPPET_LINES: usize = 4;

/// Maximum number of characters in a snippet before truncation.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 300;

/// Extract a snippet around the first line mentioning any word of `query`.
///
/// Falls back to the first few lines when nothing matches. Blank lines are
/// dropped. Returns `None` if the text has no content.
pub fn extract_snippet(text: &str, query: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
        .collect();
    let match_idx = lines.iter().position(|line| {
        let line = line.to_lowercase();
        terms.iter().any(|t| line.contains(t))
    });

    let (start, end) = match match_idx {
        Some(idx) => (idx.saturating_sub(1), (idx + 2).min(lines.len())),
        None => (0, DEFAULT_SNIPPET_LINES.min(lines.len())),
    };

    let snippet = lines[start..end].join("\n");
    Some(truncate_chars(&snippet, DEFAULT_SNIPPET_MAX_CHARS))
}

/// Cut `text` to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Prefix every line with `indent`.
pub fn indent(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_snippet_match_found() {
        let text = "line1\nline2\nline3\nrust is great\nline5\nline6\nline7";
        let snippet = extract_snippet(text, "why rust").unwrap();
        assert_eq!(snippet, "line3\nrust is great\nline5");
    }

    #[test]
    fn extract_snippet_no_match_returns_head() {
        let text = "line1\n\nline2\nline3\nline4\nline5\nline6";
        let snippet = extract_snippet(text, "zzz_nomatch").unwrap();
        assert_eq!(snippet, "line1\nline2\nline3\nline4");
    }

    #[test]
    fn extract_snippet_empty_text() {
        assert!(extract_snippet("", "query").is_none());
        assert!(extract_snippet(" \n\n", "query").is_none());
    }

    #[test]
    fn extract_snippet_truncates_long() {
        let long_line = "a".repeat(500);
        let snippet = extract_snippet(&long_line, "aaa").unwrap();
        assert_eq!(snippet.chars().count(), DEFAULT_SNIPPET_MAX_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn indent_every_line() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
    }
}
