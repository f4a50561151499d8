// src/listing_source.rs
use crate::types::JobRecord;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct ListingSource {
    client: Client,
    listing_url: String,
}

impl ListingSource {
    pub fn new(listing_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jobradar/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            listing_url: listing_url.into(),
        })
    }

    /// Current job list. Any failure degrades to an empty list.
    pub async fn fetch_jobs(&self) -> Vec<JobRecord> {
        match self.try_fetch_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Job listing fetch failed, continuing with no jobs: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_jobs(&self) -> Result<Vec<JobRecord>> {
        info!("Fetching job listings: {}", self.listing_url);

        let response = self
            .client
            .get(&self.listing_url)
            .send()
            .await
            .context("Failed to fetch job listings")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        let jobs = parse_listing(&body)?;
        info!("Fetched {} job listings", jobs.len());
        Ok(jobs)
    }
}

/// Decode a feed body. Individual records that fail to decode are skipped.
pub fn parse_listing(body: &str) -> Result<Vec<JobRecord>> {
    let listing: ListingResponse =
        serde_json::from_str(body).context("Listing body is not a valid feed document")?;

    let total = listing.data.len();
    let jobs: Vec<JobRecord> = listing
        .data
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<JobRecord>(value) {
            Ok(job) if !job.id.trim().is_empty() => Some(job),
            Ok(_) => {
                warn!("Skipping job listing with empty id");
                None
            }
            Err(e) => {
                warn!("Skipping malformed job listing: {}", e);
                None
            }
        })
        .collect();

    if jobs.len() < total {
        warn!("Dropped {} of {} job listings", total - jobs.len(), total);
    }

    Ok(jobs)
}
