use std::sync::LazyLock;

use regex::Regex;

/// Elements removed together with everything inside them.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "button", "select",
    "textarea", "iframe",
];

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<input\b[^>]*>").unwrap());
static CHROME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CHROME_TAGS
        .iter()
        .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>.*?</{t}\s*>")).unwrap())
        .collect()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
/// Tags that start or end a paragraph-level block. Inline tags (`em`, `a`, `span`…) are not here.
pub static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|h[1-6]|li|ul|ol|dl|dt|dd|blockquote|section|article|main|figure|figcaption|pre|table|tr|td|th|hr)\b[^>]*>",
    )
    .unwrap()
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Named entities the legacy posts use. `&amp;` goes last so `&amp;lt;` stays `&lt;`.
const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Strip scripts, styles and page chrome, collapse whitespace, trim.
///
/// Runs to a fixed point, so `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(markup: &str) -> String {
    let mut current = sanitize_once(markup);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(markup: &str) -> String {
    let mut out = COMMENT_RE.replace_all(markup, " ").into_owned();
    for re in CHROME_RES.iter() {
        out = re.replace_all(&out, " ").into_owned();
    }
    out = INPUT_RE.replace_all(&out, " ").into_owned();
    collapse_whitespace(&out)
}

pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Block tags become a space, inline tags vanish so `re<em>mark</em>able` stays one word.
pub fn strip_tags(markup: &str) -> String {
    let spaced = BLOCK_TAG_RE.replace_all(markup, " ");
    TAG_RE.replace_all(&spaced, "").into_owned()
}

pub fn decode_entities(s: &str) -> String {
    ENTITIES
        .iter()
        .fold(s.to_string(), |acc, (entity, ch)| acc.replace(entity, ch))
}

/// Markup fragment → readable plain text.
pub fn markup_to_text(markup: &str) -> String {
    let clean = sanitize(markup);
    collapse_whitespace(&decode_entities(&strip_tags(&clean)))
}
