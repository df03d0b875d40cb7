use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::parser::region::SelectionRule;

const CONFIG_FILE: &str = "blog-migrate";
const ENV_PREFIX: &str = "BLOG_MIGRATE";

/// Resolved run settings: defaults < `blog-migrate.toml` < `BLOG_MIGRATE_*` env < CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
    #[serde(default)]
    pub saved_images: Option<PathBuf>,
    pub region_rule: SelectionRule,
}

/// Values given on the command line; `None` leaves the lower layers in charge.
#[derive(Debug, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub saved_images: Option<PathBuf>,
}

impl Settings {
    pub fn load(overrides: Overrides) -> Result<Self> {
        let builder = config::Config::builder()
            .set_default("input_dir", "old-blog")?
            .set_default("output", "migrated-posts.json")?
            .set_default("region_rule", "longest-match")?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .set_override_option("input_dir", path_value(overrides.input_dir))?
            .set_override_option("output", path_value(overrides.output))?
            .set_override_option("assets_dir", path_value(overrides.assets_dir))?
            .set_override_option("saved_images", path_value(overrides.saved_images))?;

        builder
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

fn path_value(p: Option<PathBuf>) -> Option<String> {
    p.map(|p| p.to_string_lossy().into_owned())
}
