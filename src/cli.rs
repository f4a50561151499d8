// src/cli.rs
use crate::core::CliOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jobradar")]
#[command(about = "Build the static job board: fetch listings, enrich them, render HTML")]
pub struct Cli {
    /// YAML config file (defaults to ./jobradar.yaml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the site is written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// JSON file holding cached enrichments
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Maximum number of new AI enrichments this run
    #[arg(long)]
    pub max_new: Option<usize>,

    /// Number of tag landing pages
    #[arg(long)]
    pub top_tags: Option<usize>,

    /// Public URL the site is served from, used in the sitemap
    #[arg(long)]
    pub base_url: Option<String>,

    /// Skip AI calls; cached enrichments are still used
    #[arg(long)]
    pub no_enrich: bool,

    /// Also write JSON logs to this file (truncated on start)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            output_dir: self.output_dir.clone(),
            cache_file: self.cache_file.clone(),
            max_new: self.max_new,
            top_tags: self.top_tags,
            base_url: self.base_url.clone(),
            no_enrich: self.no_enrich,
        }
    }
}
