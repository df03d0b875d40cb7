use std::path::Path;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use tracing::{error, warn};

use crate::assets::AssetLinker;
use crate::discovery::{Discovery, DocumentPath};
use crate::error::Result;
use crate::output::{self, Batch, DocumentFailure, ExtractedPost};
use crate::parser::{self, region::RegionSelector};
use crate::settings::Settings;

/// Runs every discovered document through the parser and asset linker.
pub struct BatchRunner {
    regions: RegionSelector,
    assets: AssetLinker,
    now: DateTime<Utc>,
    fail_fast: bool,
}

impl BatchRunner {
    pub fn new(regions: RegionSelector, assets: AssetLinker, now: DateTime<Utc>) -> Self {
        BatchRunner {
            regions,
            assets,
            now,
            fail_fast: false,
        }
    }

    /// Region rule taken from the loaded settings.
    pub fn from_settings(settings: &Settings, assets: AssetLinker, now: DateTime<Utc>) -> Self {
        BatchRunner::new(RegionSelector::with_rule(settings.region_rule), assets, now)
    }

    /// Abort on the first document that cannot be read instead of recording it.
    pub fn fail_fast(mut self, yes: bool) -> Self {
        self.fail_fast = yes;
        self
    }

    pub fn assets(&self) -> &AssetLinker {
        &self.assets
    }

    /// One post per document in discovery order; unreadable documents become failures.
    pub fn run(&mut self, discovery: &Discovery, pb: &ProgressBar) -> Result<Batch> {
        let mut posts = Vec::with_capacity(discovery.len());
        let mut failures = Vec::new();

        for (i, doc) in discovery.iter().enumerate() {
            match self.process(doc, i + 1) {
                Ok(post) => posts.push(post),
                Err(e) if self.fail_fast => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", doc.relative, e);
                    failures.push(DocumentFailure {
                        source_path: doc.relative.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            pb.inc(1);
        }

        Ok(Batch::new(
            self.now,
            discovery.root().display().to_string(),
            discovery.len(),
            posts,
            failures,
        ))
    }

    /// `run`, then write the batch. The saved-images table is persisted even when
    /// the run aborts or the write fails, so copies already made stay linked.
    pub fn run_to_file(
        &mut self,
        discovery: &Discovery,
        pb: &ProgressBar,
        out: &Path,
        saved_images: Option<&Path>,
    ) -> Result<Batch> {
        let outcome = self.run(discovery, pb).and_then(|batch| {
            output::write_batch(out, &batch)?;
            Ok(batch)
        });
        if let Some(path) = saved_images {
            if let Err(e) = self.assets.persist(path) {
                if outcome.is_err() {
                    error!("Saved images not written to {:?}: {}", path, e);
                } else {
                    return Err(e);
                }
            }
        }
        outcome
    }

    pub fn process(&mut self, doc: &DocumentPath, ordinal: usize) -> Result<ExtractedPost> {
        let source = doc.load()?;
        let post = parser::process_document(&source, ordinal, &self.regions, self.now);
        Ok(self.assets.link(post))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DirectoryUploader, SavedImages};
    use crate::error::MigrateError;
    use crate::parser::region::SelectionRule;
    use chrono::TimeZone;
    use regex::Regex;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    fn set_mtime(path: &Path, secs: u64) {
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    fn run_dir(root: &Path) -> Batch {
        let discovery = Discovery::scan(root).unwrap();
        let mut runner = BatchRunner::new(RegionSelector::default(), AssetLinker::disabled(), now());
        runner.run(&discovery, &ProgressBar::hidden()).unwrap()
    }

    #[test]
    fn hello_world_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "hello.html",
            r#"<html><body><article><h1>Hello World</h1><p>Hi.</p><img src="photo.jpg"></article></body></html>"#,
        );
        set_mtime(&dir.path().join("hello.html"), 1_682_899_200); // 2023-05-01T00:00:00Z

        let batch = run_dir(dir.path());
        assert_eq!(batch.posts.len(), 1);
        let p = &batch.posts[0];
        assert_eq!(p.title, "Hello World");
        assert_eq!(p.slug, "hello-world");
        assert_eq!(p.images.len(), 1);
        assert_eq!(p.images[0].original_source, "photo.jpg");
        assert!(p.images[0].resolved_source.ends_with("/photo.jpg"));

        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["publishedAt"], "2023-05-01T00:00:00.000Z");
    }

    #[test]
    fn date_from_file_name_beats_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2022-03-04-market-day.html", "<p>Stall was busy.</p>");
        set_mtime(&dir.path().join("2022-03-04-market-day.html"), 1_682_899_200);

        let batch = run_dir(dir.path());
        let p = &batch.posts[0];
        assert_eq!(p.title, "Blog Post 1");
        assert_eq!(p.published_at, Utc.with_ymd_and_hms(2022, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn punctuation_title_slug_is_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "misc/what.html", "<h1>???</h1>");

        let batch = run_dir(dir.path());
        assert_eq!(batch.posts[0].slug, "misc-what-html");
    }

    #[test]
    fn ordinals_follow_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.html", "<p>b</p>");
        write(dir.path(), "a/z.html", "<p>z</p>");
        write(dir.path(), "a/a.html", "<h2>Named</h2>");

        let batch = run_dir(dir.path());
        let got: Vec<(&str, &str)> = batch
            .posts
            .iter()
            .map(|p| (p.source_path.as_str(), p.title.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a/a.html", "Named"),
                ("a/z.html", "Blog Post 2"),
                ("b.html", "Blog Post 3"),
            ]
        );
    }

    #[test]
    fn batch_invariants() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "one.html",
            r#"<main><h1>Eggs</h1><img src="a.jpg"><img src="logo.png"><img src="b.jpg"></main>"#,
        );
        write(dir.path(), "two.html", "<h1>Honey &amp; Wax!</h1><p>Jars.</p>");
        write(dir.path(), "three.html", "<p>...</p>");

        let batch = run_dir(dir.path());
        let clean = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
        for p in &batch.posts {
            assert!(!p.title.is_empty());
            assert!(clean.is_match(&p.slug), "slug {:?}", p.slug);
            assert_eq!(p.extracted_image_count, p.images.len());
            assert_eq!(p.primary_image.as_ref(), p.images.first());
        }
        assert_eq!(batch.summary.document_count, 3);
        assert_eq!(batch.summary.total_images, 2);
        assert_eq!(
            batch.summary.total_content_length,
            batch.posts.iter().map(|p| p.content_length).sum::<usize>()
        );
    }

    #[test]
    fn bad_document_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", "<h1>Fine</h1>");
        fs::write(dir.path().join("b.html"), [0xff, 0xfe]).unwrap();
        write(dir.path(), "c.html", "<h1>Also fine</h1>");

        let batch = run_dir(dir.path());
        assert_eq!(batch.posts.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].source_path, "b.html");
        assert_eq!(batch.summary.failed_count, 1);
    }

    #[test]
    fn fail_fast_aborts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.html"), [0xff, 0xfe]).unwrap();

        let discovery = Discovery::scan(dir.path()).unwrap();
        let mut runner =
            BatchRunner::new(RegionSelector::default(), AssetLinker::disabled(), now()).fail_fast(true);
        let err = runner.run(&discovery, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidUtf8(_)));
    }

    #[test]
    fn uploads_local_images() {
        let dir = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        write(dir.path(), "post/index.html", r#"<article><h1>Hens</h1><img src="hen.jpg"></article>"#);
        write(dir.path(), "post/hen.jpg", "jpeg");

        let discovery = Discovery::scan(dir.path()).unwrap();
        let uploader = DirectoryUploader::new(assets.path(), &SavedImages::default()).unwrap();
        let linker = AssetLinker::new(SavedImages::default(), Some(Box::new(uploader)));
        let mut runner = BatchRunner::new(RegionSelector::default(), linker, now());
        let batch = runner.run(&discovery, &ProgressBar::hidden()).unwrap();

        let img = &batch.posts[0].images[0];
        assert_eq!(img.asset_id.as_deref(), Some("image-hen-jpg"));
        assert_eq!(batch.posts[0].primary_image.as_ref(), Some(img));
        assert!(assets.path().join("image-hen-jpg.jpg").exists());
        assert_eq!(runner.assets().stats().uploaded, 1);
    }

    #[test]
    fn aborted_run_still_saves_image_table() {
        let dir = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", r#"<article><h1>Hens</h1><img src="hen.jpg"></article>"#);
        write(dir.path(), "hen.jpg", "jpeg");
        fs::write(dir.path().join("b.html"), [0xff, 0xfe]).unwrap();
        let batch_path = out.path().join("batch.json");
        let table = out.path().join("saved.json");

        let discovery = Discovery::scan(dir.path()).unwrap();
        let uploader = DirectoryUploader::new(assets.path(), &SavedImages::default()).unwrap();
        let linker = AssetLinker::new(SavedImages::default(), Some(Box::new(uploader)));
        let mut runner = BatchRunner::new(RegionSelector::default(), linker, now()).fail_fast(true);
        let err = runner
            .run_to_file(&discovery, &ProgressBar::hidden(), &batch_path, Some(&table))
            .unwrap_err();

        assert!(matches!(err, MigrateError::InvalidUtf8(_)));
        assert!(!batch_path.exists());
        let saved = SavedImages::load(&table).unwrap();
        let hen = dir.path().join("hen.jpg");
        assert_eq!(saved.get(&hen.to_string_lossy()), Some("image-hen-jpg"));
        assert!(assets.path().join("image-hen-jpg.jpg").exists());
    }

    #[test]
    fn run_to_file_writes_batch_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", "<h1>Fine</h1>");
        let batch_path = out.path().join("batch.json");
        let table = out.path().join("saved.json");

        let discovery = Discovery::scan(dir.path()).unwrap();
        let mut runner = BatchRunner::new(RegionSelector::default(), AssetLinker::disabled(), now());
        let batch = runner
            .run_to_file(&discovery, &ProgressBar::hidden(), &batch_path, Some(&table))
            .unwrap();

        let written = output::read_batch(&batch_path).unwrap();
        assert_eq!(written.posts.len(), 1);
        assert_eq!(written.posts[0].title, batch.posts[0].title);
        // nothing uploaded, nothing to persist
        assert!(!table.exists());
    }

    #[test]
    fn configured_region_rule_is_used() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.html",
            "<main>tiny</main><article>a much longer article body</article>",
        );
        let settings = Settings {
            input_dir: dir.path().to_path_buf(),
            output: dir.path().join("out.json"),
            assets_dir: None,
            saved_images: None,
            region_rule: SelectionRule::FirstMatch,
        };
        let discovery = Discovery::scan(dir.path()).unwrap();
        let mut runner = BatchRunner::from_settings(&settings, AssetLinker::disabled(), now());
        let post = runner.process(discovery.iter().next().unwrap(), 1).unwrap();
        assert_eq!(post.body_blocks[0].text, "tiny");
    }
}
