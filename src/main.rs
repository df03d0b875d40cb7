mod assets;
mod discovery;
mod error;
mod output;
mod parser;
mod pipeline;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use assets::{AssetLinker, DirectoryUploader, ImageUploader, SavedImages};
use discovery::{Discovery, DocumentPath};
use pipeline::BatchRunner;
use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "blog_migrate", about = "Convert legacy HTML blog posts into a CMS import batch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every post under the input directory and write the batch file
    Run {
        /// Directory of legacy .html posts
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Batch file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Copy local images here and link them as assets
        #[arg(long)]
        assets_dir: Option<PathBuf>,
        /// JSON table of already stored images (resolved source -> asset id)
        #[arg(long)]
        saved_images: Option<PathBuf>,
        /// Abort on the first unreadable document
        #[arg(long)]
        fail_fast: bool,
    },
    /// List the documents a run would process, in order
    Scan {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Extract one document and print its record
    Inspect {
        file: PathBuf,
    },
    /// Show posts from an existing batch file
    Summary {
        /// Batch file to read (default: configured output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            assets_dir,
            saved_images,
            fail_fast,
        } => {
            let settings = Settings::load(Overrides {
                input_dir: input,
                output,
                assets_dir,
                saved_images,
            })?;
            run(&settings, fail_fast)
        }
        Commands::Scan { input } => {
            let settings = Settings::load(Overrides {
                input_dir: input,
                ..Default::default()
            })?;
            let discovery = Discovery::scan(&settings.input_dir)?;
            for (i, doc) in discovery.iter().enumerate() {
                println!("{:>4}  {}", i + 1, doc.relative);
            }
            println!("\n{} documents in {:?}", discovery.len(), discovery.root());
            Ok(())
        }
        Commands::Inspect { file } => {
            let settings = Settings::load(Overrides::default())?;
            inspect(&settings, &file)
        }
        Commands::Summary { output, limit } => {
            let settings = Settings::load(Overrides {
                output,
                ..Default::default()
            })?;
            summary(&settings.output, limit)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run(settings: &Settings, fail_fast: bool) -> anyhow::Result<()> {
    let discovery = Discovery::scan(&settings.input_dir)?;
    if discovery.is_empty() {
        println!("No .html documents under {:?}.", settings.input_dir);
        return Ok(());
    }

    let saved = match &settings.saved_images {
        Some(path) => SavedImages::load(path)?,
        None => SavedImages::default(),
    };
    let uploader: Option<Box<dyn ImageUploader>> = match &settings.assets_dir {
        Some(dir) => Some(Box::new(DirectoryUploader::new(dir, &saved)?)),
        None => None,
    };
    info!(
        saved_images = saved.len(),
        uploads = uploader.is_some(),
        "Asset linking configured"
    );

    let pb = ProgressBar::new(discovery.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    println!("Extracting {} documents...", discovery.len());
    let mut runner =
        BatchRunner::from_settings(settings, AssetLinker::new(saved, uploader), Utc::now())
            .fail_fast(fail_fast);
    let batch = runner
        .run_to_file(
            &discovery,
            &pb,
            &settings.output,
            settings.saved_images.as_deref(),
        )
        .with_context(|| format!("No output written to {:?}", settings.output));
    pb.finish_and_clear();
    let batch = batch?;

    let s = &batch.summary;
    println!(
        "Saved {} posts ({} failed), {} images, {} chars of content to {:?}.",
        s.post_count, s.failed_count, s.total_images, s.total_content_length, settings.output
    );
    let links = runner.assets().stats();
    if links.reused + links.uploaded + links.failed > 0 {
        println!(
            "Assets: {} reused, {} uploaded, {} not linked ({} known).",
            links.reused,
            links.uploaded,
            links.failed,
            runner.assets().saved().len()
        );
    }
    for f in &batch.failures {
        println!("  failed: {}: {}", f.source_path, f.reason);
    }
    Ok(())
}

fn inspect(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let doc = DocumentPath {
        path: file.to_path_buf(),
        relative: file.to_string_lossy().replace('\\', "/"),
    };
    let mut runner = BatchRunner::from_settings(settings, AssetLinker::disabled(), Utc::now());
    let post = runner.process(&doc, 1)?;
    println!("{}", serde_json::to_string_pretty(&post)?);
    Ok(())
}

fn summary(path: &Path, limit: usize) -> anyhow::Result<()> {
    let batch = output::read_batch(path)?;
    if batch.posts.is_empty() {
        println!("No posts in {:?}.", path);
        return Ok(());
    }

    println!(
        "{:>3} | {:<32} | {:<24} | {:<10} | {:>4} | {:>7}",
        "#", "Title", "Slug", "Published", "Imgs", "Chars"
    );
    println!("{}", "-".repeat(96));

    for (i, p) in batch.posts.iter().take(limit).enumerate() {
        println!(
            "{:>3} | {:<32} | {:<24} | {:<10} | {:>4} | {:>7}",
            i + 1,
            truncate(&p.title, 32),
            truncate(&p.slug, 24),
            p.published_at.format("%Y-%m-%d").to_string(),
            p.extracted_image_count,
            p.content_length
        );
    }

    if !batch.failures.is_empty() {
        println!("\n--- Failures ---");
        for f in &batch.failures {
            println!("  {}: {}", f.source_path, f.reason);
        }
    }

    let s = &batch.summary;
    println!(
        "\n{} documents | {} posts | {} failed | {} images | {} chars | generated {}",
        s.document_count,
        s.post_count,
        s.failed_count,
        s.total_images,
        s.total_content_length,
        batch.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
