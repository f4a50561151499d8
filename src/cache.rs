// src/cache.rs
//! Persistent job-id -> enrichment cache backed by a single JSON file

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::FsOps;
use crate::types::{EnrichmentResult, RawEnrichment};

pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, EnrichmentResult>,
    dirty: bool,
}

impl CacheStore {
    /// Empty cache that will flush to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache file. A missing or unreadable file yields an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);

        let content = match tokio::fs::read_to_string(&store.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No cache file at {}, starting empty", store.path.display());
                return store;
            }
            Err(e) => {
                warn!(
                    "Failed to read cache file {}: {}; starting empty",
                    store.path.display(),
                    e
                );
                return store;
            }
        };

        match Self::parse_entries(&content) {
            Ok(entries) => {
                info!(
                    "Loaded {} cached enrichments from {}",
                    entries.len(),
                    store.path.display()
                );
                store.entries = entries;
            }
            Err(e) => {
                warn!(
                    "Cache file {} is malformed ({}); starting empty",
                    store.path.display(),
                    e
                );
            }
        }

        store
    }

    /// Entries are normalized on the way in; entries without a usable summary are dropped.
    fn parse_entries(content: &str) -> Result<BTreeMap<String, EnrichmentResult>> {
        let raw: BTreeMap<String, Value> =
            serde_json::from_str(content).context("cache is not a JSON object")?;

        let mut entries = BTreeMap::new();
        for (id, value) in raw {
            match serde_json::from_value::<RawEnrichment>(value)
                .ok()
                .and_then(RawEnrichment::normalize)
            {
                Some(result) => {
                    entries.insert(id, result);
                }
                None => debug!("Skipping unusable cache entry: {}", id),
            }
        }
        Ok(entries)
    }

    pub fn get(&self, id: &str) -> Option<&EnrichmentResult> {
        self.entries.get(id)
    }

    pub fn put(&mut self, id: impl Into<String>, result: EnrichmentResult) {
        let id = id.into();
        if self.entries.get(&id) != Some(&result) {
            self.entries.insert(id, result);
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when entries were added since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the whole map and atomically replace the cache file.
    pub async fn flush(&mut self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize cache")?;
        FsOps::write_atomic(&self.path, &content).await?;
        self.dirty = false;
        debug!(
            "Flushed {} cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
