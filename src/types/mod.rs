pub mod enrichment;
pub mod job;

pub use enrichment::{EnrichedJob, EnrichmentResult, EnrichmentSource, RawEnrichment};
pub use job::JobRecord;
