use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DASHES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

/// Title slug, or the path-derived fallback when the title has no usable characters.
pub fn derive(title: &str, relative_path: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        path_slug(relative_path)
    } else {
        slug
    }
}

/// Output matches `^[a-z0-9]+(-[a-z0-9]+)*$` or is empty.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase().replace('_', " ");
    let kept = NON_SLUG_RE.replace_all(&lower, "");
    let dashed = WS_RE.replace_all(&kept, "-");
    DASHES_RE
        .replace_all(&dashed, "-")
        .trim_matches('-')
        .to_string()
}

pub fn path_slug(relative_path: &str) -> String {
    relative_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
