// src/types/enrichment.rs
//! AI enrichment payloads, their cached form and the enriched record handed to rendering

use serde::{Deserialize, Serialize};

use super::job::JobRecord;

pub const SALARY_PLACEHOLDER: &str = "Auf Anfrage";
pub const SUMMARY_PLACEHOLDER: &str = "Analyse ausstehend";
pub const SALARY_UNKNOWN: &str = "Unbekannt";

/// Normalized enrichment, also the on-disk cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub salary_estimate: String,
    pub summary: String,
}

impl EnrichmentResult {
    pub fn placeholder() -> Self {
        Self {
            salary_estimate: SALARY_PLACEHOLDER.to_string(),
            summary: SUMMARY_PLACEHOLDER.to_string(),
        }
    }
}

/// Summary as the model may return it: plain text or a list of sentences.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SummaryField {
    Text(String),
    Lines(Vec<String>),
}

impl SummaryField {
    pub fn into_text(self) -> String {
        match self {
            SummaryField::Text(text) => text.trim().to_string(),
            SummaryField::Lines(lines) => lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Structured payload before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnrichment {
    #[serde(default)]
    pub salary_estimate: Option<String>,
    #[serde(default)]
    pub summary: Option<SummaryField>,
}

impl RawEnrichment {
    /// Accept the payload as a whole or not at all: a usable summary is required,
    /// a missing salary degrades to the "unknown" sentinel.
    pub fn normalize(self) -> Option<EnrichmentResult> {
        let summary = self.summary.map(SummaryField::into_text)?;
        if summary.is_empty() {
            return None;
        }

        let salary_estimate = self
            .salary_estimate
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| SALARY_UNKNOWN.to_string());

        Some(EnrichmentResult {
            salary_estimate,
            summary,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    Cache,
    Fresh,
    Placeholder,
}

/// A job together with the enrichment it will be rendered with.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub salary_estimate: String,
    pub summary: String,
    #[serde(skip)]
    pub source: EnrichmentSource,
}

impl EnrichedJob {
    pub fn new(job: JobRecord, result: EnrichmentResult, source: EnrichmentSource) -> Self {
        Self {
            job,
            salary_estimate: result.salary_estimate,
            summary: result.summary,
            source,
        }
    }

    pub fn placeholder(job: JobRecord) -> Self {
        Self::new(job, EnrichmentResult::placeholder(), EnrichmentSource::Placeholder)
    }
}
