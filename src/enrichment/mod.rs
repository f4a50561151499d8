// src/enrichment/mod.rs
use async_trait::async_trait;

use crate::types::{EnrichmentResult, JobRecord};

pub mod client;
pub mod error;
pub mod pipeline;
pub(crate) mod types;

pub use client::EnrichmentClient;
pub use error::EnrichError;
pub use pipeline::{EnrichmentPipeline, PipelineStats};

/// Anything that can turn a job into a salary estimate and summary.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// `None` means "no result this time"; failures are logged by the implementor.
    async fn analyze(&self, job: &JobRecord) -> Option<EnrichmentResult>;
}
