use anyhow::Result;
use serde::Serialize;
use tracing::info;

pub mod cache;
pub mod cli;
pub mod core;
pub mod enrichment;
pub mod generator;
pub mod listing_source;
pub mod tags;
pub mod template_processor;
pub mod types;

use crate::cache::CacheStore;
use crate::core::ConfigManager;
use crate::enrichment::{Enricher, EnrichmentClient, EnrichmentPipeline, PipelineStats};
use crate::generator::{SiteGenerator, SiteOutput};
use crate::listing_source::ListingSource;
use crate::types::JobRecord;

/// What a single build did
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub jobs: usize,
    pub enrichment_enabled: bool,
    pub top_tags: Vec<String>,
    pub pipeline: PipelineStats,
    pub site: SiteOutput,
}

/// Fetch, enrich and render the whole board.
/// Only local output failures are fatal; everything upstream degrades.
pub async fn run(config: &ConfigManager) -> Result<BuildReport> {
    info!("Building job board '{}'", config.site.site_name);

    let source = ListingSource::new(config.site.listing_url.clone())?;
    let jobs = source.fetch_jobs().await;

    build_from_jobs(config, jobs).await
}

/// Everything after the fetch; split out so a build can run on a fixed job list.
pub async fn build_from_jobs(config: &ConfigManager, jobs: Vec<JobRecord>) -> Result<BuildReport> {
    let job_count = jobs.len();
    let mut cache = CacheStore::load(config.pipeline.cache_file.clone()).await;

    let client = if config.enrichment_enabled() {
        Some(EnrichmentClient::new(
            config.enrichment.clone(),
            config.api_key.clone(),
        )?)
    } else {
        info!("AI enrichment disabled for this run, using cache only");
        None
    };
    let enricher = client.as_ref().map(|c| c as &dyn Enricher);

    let pipeline = EnrichmentPipeline::from_config(enricher, &config.pipeline);
    let (enriched, stats) = pipeline.enrich(jobs, &mut cache).await;

    let top_tags = tags::top_tags(enriched.iter().map(|e| &e.job), config.site.top_tags);
    info!("Top tags: {:?}", top_tags);

    let generator = SiteGenerator::new(config.site.clone());
    let site = generator.generate(&enriched, &top_tags).await?;

    Ok(BuildReport {
        jobs: job_count,
        enrichment_enabled: client.is_some(),
        top_tags,
        pipeline: stats,
        site,
    })
}
