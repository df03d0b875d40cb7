use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::{MigrateError, Result};

const MARKUP_EXTENSION: &str = "html";

/// One discovered markup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    pub path: PathBuf,
    /// Path relative to the input root, `/`-separated.
    pub relative: String,
}

/// A markup document loaded from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub relative: String,
    pub markup: String,
    pub modified: Option<SystemTime>,
}

/// Sorted set of markup files under a root directory. Iterating is cheap and
/// can be repeated; documents are only read when `load` is called.
#[derive(Debug, Clone)]
pub struct Discovery {
    root: PathBuf,
    documents: Vec<DocumentPath>,
}

impl Discovery {
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(MigrateError::DirectoryNotFound(root.to_path_buf()));
        }

        let mut documents = Vec::new();
        walk(root, root, &mut documents)?;
        documents.sort_by(|a, b| a.relative.cmp(&b.relative));

        info!("Found {} markup documents under {:?}", documents.len(), root);
        Ok(Discovery {
            root: root.to_path_buf(),
            documents,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentPath> + '_ {
        self.documents.iter()
    }
}

impl DocumentPath {
    pub fn load(&self) -> Result<SourceDocument> {
        let bytes = fs::read(&self.path).map_err(|source| MigrateError::Read {
            path: self.path.clone(),
            source,
        })?;
        let markup =
            String::from_utf8(bytes).map_err(|_| MigrateError::InvalidUtf8(self.path.clone()))?;
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok();

        Ok(SourceDocument {
            path: self.path.clone(),
            relative: self.relative.clone(),
            markup,
            modified,
        })
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<DocumentPath>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| MigrateError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| MigrateError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            walk(root, &path, out)?;
        } else if is_markup(&path) {
            let relative = relative_path(root, &path);
            debug!(path = %relative, "discovered");
            out.push(DocumentPath { path, relative });
        }
    }
    Ok(())
}

fn is_markup(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(MARKUP_EXTENSION))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
