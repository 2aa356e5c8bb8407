//! Output formatting for search results.
//!
//! Supports human-readable terminal output and JSON for scripting.

use anyhow::Result;
use vectura_core::SearchResult;

/// Maximum characters to show in a text snippet.
const SNIPPET_MAX_LEN: usize = 200;

/// Formats search results as pretty JSON.
///
/// `SearchResult` already derives `Serialize`, so the results are emitted
/// as-is.
pub fn format_json(results: &[SearchResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Formats search results for the terminal.
pub fn format_human(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results for \"{query}\"");
    }

    let mut out = format!("{} result(s) for \"{query}\"\n", results.len());
    for (rank, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>2}. [{:.4}] {}\n    {}\n",
            rank + 1,
            result.score,
            result.id,
            truncate_text(&result.text, SNIPPET_MAX_LEN)
        ));
    }
    out
}

/// Truncates text to `max_len` characters on a char boundary, appending an
/// ellipsis when anything was cut.
fn truncate_text(text: &str, max_len: usize) -> String {
    let flattened: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_len {
        return flattened;
    }
    let truncated: String = flattened.chars().take(max_len).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_truncate_flattens_whitespace() {
        assert_eq!(truncate_text("a\n  b\t c", 10), "a b c");
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        let long = "x".repeat(300);
        let out = truncate_text(&long, 200);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('…'));
    }
}
