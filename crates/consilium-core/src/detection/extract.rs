//! Pulling a JSON object out of free-form classifier output.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("Invalid fenced JSON regex")
});

/// Best JSON object candidate in `text`.
///
/// Precedence: a fenced ```` ```json ```` block, then the longest balanced
/// `{...}` span that parses as JSON, then the trimmed text itself.
pub fn extract_json(text: &str) -> &str {
    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Some(block) = captures.get(1) {
            return block.as_str();
        }
    }

    largest_json_object(text).unwrap_or_else(|| text.trim())
}

/// Only this many leading bytes of a reply are searched for braces.
pub const MAX_SCANNED_BYTES: usize = 8 * 1024;

/// The longest balanced-brace span that is valid JSON.
///
/// Only the first [`MAX_SCANNED_BYTES`] of `text` are considered.
pub fn largest_json_object(text: &str) -> Option<&str> {
    let mut limit = text.len().min(MAX_SCANNED_BYTES);
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    let text = &text[..limit];

    let mut best: Option<&str> = None;
    for (start, _) in text.match_indices('{') {
        let Some(end) = balanced_end(text, start) else {
            continue;
        };
        let candidate = &text[start..end];
        if best.is_some_and(|b| b.len() >= candidate.len()) {
            continue;
        }
        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            best = Some(candidate);
        }
    }
    best
}

/// Byte offset just past the brace closing the one opened at `start`.
///
/// Braces inside JSON string literals are ignored.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
