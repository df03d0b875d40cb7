use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::output::ImageRef;

static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());
static SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});
static ALT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\salt\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").unwrap());

/// Substrings that mark site chrome rather than article photos.
const EXCLUDED_SUBSTRINGS: &[&str] = &["icon", "logo"];

/// Images in the region, in first-seen order, with relative sources resolved
/// against `doc_dir`.
pub fn extract(region: &str, doc_dir: &Path) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for tag in IMG_RE.find_iter(region) {
        let tag = tag.as_str();
        let Some(src) = attr(&SRC_RE, tag) else {
            continue;
        };
        let src = src.trim();
        if src.is_empty() || is_excluded(src) || !seen.insert(src.to_string()) {
            continue;
        }

        images.push(ImageRef {
            resolved_source: resolve(src, doc_dir),
            alt_text: attr(&ALT_RE, tag).unwrap_or_default().trim().to_string(),
            original_source: src.to_string(),
            asset_id: None,
        });
    }

    images
}

pub fn is_excluded(src: &str) -> bool {
    src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
        || EXCLUDED_SUBSTRINGS.iter().any(|s| src.contains(s))
}

/// `scheme://…` or protocol-relative `//…`.
pub fn is_remote(src: &str) -> bool {
    SCHEME_RE.is_match(src) || src.starts_with("//")
}

pub fn is_absolute(src: &str) -> bool {
    src.starts_with('/') || is_remote(src)
}

fn attr<'a>(re: &Regex, tag: &'a str) -> Option<&'a str> {
    let caps = re.captures(tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

fn resolve(src: &str, doc_dir: &Path) -> String {
    if is_absolute(src) {
        return src.to_string();
    }
    let joined = doc_dir.join(src);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);
    normalize(&absolute).to_string_lossy().into_owned()
}

/// Lexically drop `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
