use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub resolved_source: String,
    pub alt_text: String,
    pub original_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub marks: Vec<String>,
}

/// One paragraph of post body, in the importer's tagged-block shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: String,
    pub text: String,
    pub children: Vec<Span>,
}

impl ContentBlock {
    pub fn paragraph(text: String) -> Self {
        ContentBlock {
            kind: "paragraph".into(),
            children: vec![Span {
                kind: "span".into(),
                text: text.clone(),
                marks: Vec::new(),
            }],
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPost {
    pub title: String,
    pub slug: String,
    #[serde(with = "millis_utc")]
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<ImageRef>,
    pub images: Vec<ImageRef>,
    pub body_blocks: Vec<ContentBlock>,
    pub source_path: String,
    pub extracted_image_count: usize,
    pub content_length: usize,
}

impl ExtractedPost {
    /// Builds a post, deriving `primary_image` and `extracted_image_count` from `images`.
    pub fn new(
        title: String,
        slug: String,
        published_at: DateTime<Utc>,
        images: Vec<ImageRef>,
        body_blocks: Vec<ContentBlock>,
        source_path: String,
        content_length: usize,
    ) -> Self {
        ExtractedPost {
            title,
            slug,
            published_at,
            primary_image: images.first().cloned(),
            extracted_image_count: images.len(),
            images,
            body_blocks,
            source_path,
            content_length,
        }
    }

    /// Same post with a new image list; keeps the derived fields in step.
    pub fn with_images(self, images: Vec<ImageRef>) -> Self {
        ExtractedPost::new(
            self.title,
            self.slug,
            self.published_at,
            images,
            self.body_blocks,
            self.source_path,
            self.content_length,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFailure {
    pub source_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub document_count: usize,
    pub post_count: usize,
    pub failed_count: usize,
    pub total_images: usize,
    pub total_content_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(with = "millis_utc")]
    pub generated_at: DateTime<Utc>,
    pub input_dir: String,
    pub posts: Vec<ExtractedPost>,
    pub failures: Vec<DocumentFailure>,
    pub summary: Summary,
}

impl Batch {
    pub fn new(
        generated_at: DateTime<Utc>,
        input_dir: String,
        document_count: usize,
        posts: Vec<ExtractedPost>,
        failures: Vec<DocumentFailure>,
    ) -> Self {
        let summary = Summary {
            document_count,
            post_count: posts.len(),
            failed_count: failures.len(),
            total_images: posts.iter().map(|p| p.extracted_image_count).sum(),
            total_content_length: posts.iter().map(|p| p.content_length).sum(),
        };
        Batch {
            generated_at,
            input_dir,
            posts,
            failures,
            summary,
        }
    }
}

/// Write the batch next to its final path, then rename over it.
pub fn write_batch(path: &Path, batch: &Batch) -> Result<()> {
    let json = serde_json::to_string_pretty(batch).map_err(|source| MigrateError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, json.as_bytes())?;
    info!("Wrote {} posts to {:?}", batch.posts.len(), path);
    Ok(())
}

pub fn read_batch(path: &Path) -> Result<Batch> {
    let raw = fs::read_to_string(path).map_err(|source| MigrateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| MigrateError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| MigrateError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        write_err(source)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `2023-05-01T00:00:00.000Z`
mod millis_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
