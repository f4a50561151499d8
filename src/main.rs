use anyhow::{Context, Result};
use clap::Parser;
use job_board::cli::Cli;
use job_board::core::ConfigManager;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = ConfigManager::load(&cli.overrides())?;
    info!("Output: {}", config.site.output_dir.display());
    info!("Cache: {}", config.pipeline.cache_file.display());

    let report = job_board::run(&config).await?;

    info!(
        jobs = report.jobs,
        cache_hits = report.pipeline.cache_hits,
        new_enrichments = report.pipeline.new_enrichments,
        placeholders = report.pipeline.placeholders,
        files = report.site.files_written,
        "Build finished"
    );
    println!(
        "✅ {} job pages, {} tag pages written to {}",
        report.site.job_pages,
        report.site.tag_pages,
        config.site.output_dir.display()
    );

    Ok(())
}
