// Text helpers shared by agents that read model output

use std::sync::LazyLock;

use regex::Regex;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid regex"));

/// Bodies of all fenced code blocks, in order of appearance
pub fn code_blocks(text: &str) -> Vec<String> {
    CODE_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First fenced block, trimmed, or the whole trimmed text when there is none
pub fn first_code_block_or_text(text: &str) -> String {
    code_blocks(text)
        .into_iter()
        .next()
        .map(|block| block.trim().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// Prefix of at most `max_chars` characters
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
