use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::output::{self, ExtractedPost, ImageRef};
use crate::parser::extract::{images::is_remote, slug::slugify};

/// Stores one image and returns the asset id it can be referenced by.
pub trait ImageUploader {
    fn upload(&mut self, image: &ImageRef) -> Result<String>;
}

/// Copies local image files into a directory, named by asset id.
pub struct DirectoryUploader {
    dest: PathBuf,
    used: HashSet<String>,
}

impl DirectoryUploader {
    /// Ids already in `saved` or already on disk in `dest` are never handed out again.
    pub fn new(dest: &Path, saved: &SavedImages) -> Result<Self> {
        fs::create_dir_all(dest).map_err(|source| MigrateError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        let entries = fs::read_dir(dest).map_err(|source| MigrateError::Read {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut used: HashSet<String> = saved.asset_ids().map(str::to_string).collect();
        for entry in entries.flatten() {
            if let Some(stem) = entry.path().file_stem() {
                used.insert(stem.to_string_lossy().into_owned());
            }
        }
        debug!(dest = %dest.display(), taken = used.len(), "asset ids reserved");

        Ok(DirectoryUploader {
            dest: dest.to_path_buf(),
            used,
        })
    }

    fn unique_id(&mut self, file_name: &str) -> String {
        let stem = slugify(&file_name.replace('.', " "));
        let base = if stem.is_empty() {
            "image".to_string()
        } else {
            format!("image-{}", stem)
        };
        let mut id = base.clone();
        let mut n = 2;
        while !self.used.insert(id.clone()) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }
}

impl ImageUploader for DirectoryUploader {
    fn upload(&mut self, image: &ImageRef) -> Result<String> {
        let src = &image.resolved_source;
        if is_remote(src) {
            return Err(MigrateError::UnsupportedSource(src.clone()));
        }
        let path = Path::new(src);
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| MigrateError::UnsupportedSource(src.clone()))?;

        let id = self.unique_id(&file_name);
        let target = match path.extension() {
            Some(ext) => self.dest.join(format!("{}.{}", id, ext.to_string_lossy())),
            None => self.dest.join(&id),
        };
        fs::copy(path, &target).map_err(|source| MigrateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(%src, asset = %id, "uploaded");
        Ok(id)
    }
}

/// Resolved image source → asset id, for images stored by an earlier run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedImages(BTreeMap<String, String>);

impl SavedImages {
    /// A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SavedImages::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| MigrateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| MigrateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| MigrateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        output::write_atomic(path, json.as_bytes())
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.0.get(source).map(String::as_str)
    }

    pub fn insert(&mut self, source: String, asset_id: String) {
        self.0.insert(source, asset_id);
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    pub reused: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Attaches asset ids to extracted images: saved table first, then the uploader.
pub struct AssetLinker {
    saved: SavedImages,
    uploader: Option<Box<dyn ImageUploader>>,
    stats: LinkStats,
}

impl AssetLinker {
    pub fn new(saved: SavedImages, uploader: Option<Box<dyn ImageUploader>>) -> Self {
        AssetLinker {
            saved,
            uploader,
            stats: LinkStats::default(),
        }
    }

    /// No table, no uploader: posts pass through unchanged.
    pub fn disabled() -> Self {
        AssetLinker::new(SavedImages::default(), None)
    }

    pub fn link(&mut self, post: ExtractedPost) -> ExtractedPost {
        if self.saved.is_empty() && self.uploader.is_none() {
            return post;
        }
        let images = post
            .images
            .iter()
            .cloned()
            .map(|image| self.link_image(image))
            .collect();
        post.with_images(images)
    }

    fn link_image(&mut self, mut image: ImageRef) -> ImageRef {
        if let Some(id) = self.saved.get(&image.resolved_source) {
            image.asset_id = Some(id.to_string());
            self.stats.reused += 1;
            return image;
        }
        let Some(uploader) = self.uploader.as_mut() else {
            return image;
        };
        match uploader.upload(&image) {
            Ok(id) => {
                self.saved.insert(image.resolved_source.clone(), id.clone());
                image.asset_id = Some(id);
                self.stats.uploaded += 1;
            }
            Err(e) => {
                warn!("Image not linked: {}", e);
                self.stats.failed += 1;
            }
        }
        image
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn saved(&self) -> &SavedImages {
        &self.saved
    }

    /// Write the table back if anything new was uploaded.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if self.stats.uploaded == 0 {
            return Ok(());
        }
        self.saved.save(path)?;
        info!(
            "Saved {} image assets to {:?} ({} new)",
            self.saved.len(),
            path,
            self.stats.uploaded
        );
        Ok(())
    }
}
