use std::sync::LazyLock;

use regex::Regex;

use crate::parser::sanitize::markup_to_text;

/// Checked in order; the first one with non-empty text wins.
const TITLE_TAGS: &[&str] = &["title", "h1", "h2", "h3"];

static TITLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TITLE_TAGS
        .iter()
        .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>(.*?)</{t}\s*>")).unwrap())
        .collect()
});

pub fn extract(raw: &str, ordinal: usize) -> String {
    find(raw).unwrap_or_else(|| placeholder(ordinal))
}

pub fn find(raw: &str) -> Option<String> {
    TITLE_RES.iter().find_map(|re| {
        let inner = re.captures(raw)?.get(1)?.as_str();
        let text = markup_to_text(inner);
        (!text.is_empty()).then_some(text)
    })
}

pub fn placeholder(ordinal: usize) -> String {
    format!("Blog Post {}", ordinal)
}
