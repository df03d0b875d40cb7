pub mod extract;
pub mod region;
pub mod sanitize;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::discovery::SourceDocument;
use crate::output::ExtractedPost;
use region::RegionSelector;

/// Three-step pipeline: raw markup → content region → sanitized region → post record.
pub fn process_document(
    doc: &SourceDocument,
    ordinal: usize,
    regions: &RegionSelector,
    now: DateTime<Utc>,
) -> ExtractedPost {
    let region = regions.select(&doc.markup);
    debug!(
        path = %doc.relative,
        region = region.matcher.unwrap_or("document"),
        "selected content region"
    );
    let sanitized = sanitize::sanitize(region.text);
    extract::extract_all(doc, ordinal, &sanitized, now)
}
