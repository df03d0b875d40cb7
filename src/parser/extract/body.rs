use crate::output::ContentBlock;
use crate::parser::sanitize::{markup_to_text, BLOCK_TAG_RE};

/// Plain text of the whole sanitized region.
pub fn text(sanitized: &str) -> String {
    markup_to_text(sanitized)
}

/// Split the sanitized region into paragraphs, in document order.
pub fn blocks(sanitized: &str) -> Vec<ContentBlock> {
    BLOCK_TAG_RE
        .split(sanitized)
        .map(markup_to_text)
        .filter(|t| !t.is_empty())
        .map(ContentBlock::paragraph)
        .collect()
}
