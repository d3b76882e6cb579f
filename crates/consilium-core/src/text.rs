//! Text helpers shared by the detector and the connector.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid reasoning regex"));

/// Placeholder substituted with the user request in prompt templates.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Remove every `<think>…</think>` region a reasoning model may emit.
pub fn strip_reasoning(text: &str) -> String {
    REASONING_BLOCK.replace_all(text, "").into_owned()
}

/// Number of input placeholders in a prompt template.
pub fn placeholder_count(template: &str) -> usize {
    template.matches(INPUT_PLACEHOLDER).count()
}

/// First `limit` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
