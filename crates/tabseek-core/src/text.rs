use std::collections::HashSet;

/// Splits on whitespace runs and keeps the first occurrence of every token.
#[must_use]
pub fn dedupe_tokens(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter(|token| seen.insert(*token))
        .collect()
}

/// Clips a display title to `max_chars` characters and marks the cut with `...`.
///
/// Whitespace left dangling at the cut is dropped so the marker hugs the last word.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
