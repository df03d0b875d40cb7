pub mod body;
pub mod dates;
pub mod images;
pub mod slug;
pub mod title;

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::discovery::SourceDocument;
use crate::output::ExtractedPost;
use dates::DateInputs;

/// Build a post record from the raw document and its sanitized content region.
pub fn extract_all(
    doc: &SourceDocument,
    ordinal: usize,
    sanitized: &str,
    now: DateTime<Utc>,
) -> ExtractedPost {
    let title = title::extract(&doc.markup, ordinal);
    let slug = slug::derive(&title, &doc.relative);

    let doc_dir = doc.path.parent().unwrap_or_else(|| Path::new("."));
    let images = images::extract(sanitized, doc_dir);

    let (published_at, rule) = dates::infer(&DateInputs {
        raw: &doc.markup,
        relative_path: &doc.relative,
        modified: doc.modified,
        now,
    });

    let content_length = body::text(sanitized).chars().count();
    let blocks = body::blocks(sanitized);

    debug!(
        path = %doc.relative,
        %slug,
        date_rule = ?rule,
        images = images.len(),
        blocks = blocks.len(),
        content_length,
        "extracted"
    );

    ExtractedPost::new(
        title,
        slug,
        published_at,
        images,
        blocks,
        doc.relative.clone(),
        content_length,
    )
}
