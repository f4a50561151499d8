// src/enrichment/pipeline.rs
//! Cache-first enrichment of a job list under a per-run budget of new enrichments

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Enricher;
use crate::cache::CacheStore;
use crate::core::config_manager::PipelineConfig;
use crate::types::{EnrichedJob, EnrichmentSource, JobRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub processed: usize,
    pub cache_hits: usize,
    /// Calls made to the enricher this run, successful or not
    pub calls: usize,
    /// Successful new enrichments; bounded by `max_new`
    pub new_enrichments: usize,
    pub failed_calls: usize,
    pub placeholders: usize,
    pub flushes: usize,
}

pub struct EnrichmentPipeline<'a> {
    enricher: Option<&'a dyn Enricher>,
    max_new: usize,
    max_failed_calls: usize,
    flush_every: usize,
    pause_after_success: Duration,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(enricher: &'a dyn Enricher, max_new: usize) -> Self {
        Self::from_config(
            Some(enricher),
            &PipelineConfig {
                max_new_enrichments: max_new,
                pause_after_success_millis: 0,
                ..Default::default()
            },
        )
    }

    /// `enricher: None` means cache lookups only; misses get placeholders.
    pub fn from_config(enricher: Option<&'a dyn Enricher>, config: &PipelineConfig) -> Self {
        Self {
            enricher,
            max_new: config.max_new_enrichments,
            max_failed_calls: config.max_failed_calls.max(1),
            flush_every: config.flush_every,
            pause_after_success: config.pause_after_success(),
        }
    }

    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every;
        self
    }

    /// Upper bound on enricher calls in one run: every success counts against
    /// `max_new`, every failure against `max_failed_calls`.
    pub fn call_ceiling(&self) -> usize {
        self.max_new + self.max_failed_calls
    }

    /// Enrich every job, in order. Every returned record carries either a real
    /// result or the placeholder; the cache is flushed every `flush_every`
    /// records (when it changed) and once more at the end.
    pub async fn enrich(
        &self,
        jobs: Vec<JobRecord>,
        cache: &mut CacheStore,
    ) -> (Vec<EnrichedJob>, PipelineStats) {
        let mut stats = PipelineStats::default();
        let mut enriched = Vec::with_capacity(jobs.len());
        if self.enricher.is_some() {
            debug!(
                max_new = self.max_new,
                max_calls = self.call_ceiling(),
                "Enriching {} jobs",
                jobs.len()
            );
        }

        for job in jobs {
            let record = self.enrich_one(job, cache, &mut stats).await;
            enriched.push(record);
            stats.processed += 1;

            if self.flush_every > 0 && stats.processed % self.flush_every == 0 && cache.is_dirty()
            {
                Self::flush(cache, &mut stats).await;
            }
        }

        Self::flush(cache, &mut stats).await;

        info!(
            processed = stats.processed,
            cache_hits = stats.cache_hits,
            calls = stats.calls,
            new_enrichments = stats.new_enrichments,
            failed_calls = stats.failed_calls,
            placeholders = stats.placeholders,
            "Enrichment finished"
        );

        (enriched, stats)
    }

    async fn enrich_one(
        &self,
        job: JobRecord,
        cache: &mut CacheStore,
        stats: &mut PipelineStats,
    ) -> EnrichedJob {
        if let Some(hit) = cache.get(&job.id) {
            stats.cache_hits += 1;
            let hit = hit.clone();
            return EnrichedJob::new(job, hit, EnrichmentSource::Cache);
        }

        let enricher = match self.enricher {
            Some(enricher)
                if stats.new_enrichments < self.max_new
                    && stats.failed_calls < self.max_failed_calls =>
            {
                enricher
            }
            _ => {
                stats.placeholders += 1;
                return EnrichedJob::placeholder(job);
            }
        };

        stats.calls += 1;
        match enricher.analyze(&job).await {
            Some(result) => {
                cache.put(job.id.clone(), result.clone());
                stats.new_enrichments += 1;
                debug!(
                    job_id = %job.id,
                    "New enrichment {}/{}", stats.new_enrichments, self.max_new
                );
                if !self.pause_after_success.is_zero() {
                    tokio::time::sleep(self.pause_after_success).await;
                }
                EnrichedJob::new(job, result, EnrichmentSource::Fresh)
            }
            None => {
                stats.failed_calls += 1;
                stats.placeholders += 1;
                if stats.failed_calls == self.max_failed_calls {
                    warn!(
                        failed_calls = stats.failed_calls,
                        "Enrichment keeps failing, no more calls this run; remaining misses get placeholders"
                    );
                }
                EnrichedJob::placeholder(job)
            }
        }
    }

    async fn flush(cache: &mut CacheStore, stats: &mut PipelineStats) {
        match cache.flush().await {
            Ok(()) => stats.flushes += 1,
            Err(e) => warn!(
                "Failed to persist cache to {}: {:#}",
                cache.path().display(),
                e
            ),
        }
    }
}
