// src/core/config_manager.rs
//! Layered configuration: defaults, optional YAML file, environment, CLI flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "jobradar.yaml";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    pub site: SiteConfig,
    pub enrichment: EnrichmentConfig,
    pub pipeline: PipelineConfig,
    /// Bearer credential for the enrichment service; `None` disables enrichment.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_name: String,
    pub base_url: String,
    pub listing_url: String,
    pub output_dir: PathBuf,
    pub top_tags: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "RemoteRadar".to_string(),
            base_url: "https://dein-jobboard-name.netlify.app".to_string(),
            listing_url: "https://www.arbeitnow.com/api/job-board-api".to_string(),
            output_dir: PathBuf::from("job_board"),
            top_tags: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_attempts: u32,
    pub rate_limit_backoff_secs: u64,
    pub network_retry_secs: u64,
    pub request_timeout_secs: u64,
    pub description_prefix_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_attempts: 3,
            rate_limit_backoff_secs: 20,
            network_retry_secs: 5,
            request_timeout_secs: 60,
            description_prefix_chars: 400,
        }
    }
}

impl EnrichmentConfig {
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn network_retry_delay(&self) -> Duration {
        Duration::from_secs(self.network_retry_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub cache_file: PathBuf,
    pub max_new_enrichments: usize,
    /// Failed enricher calls tolerated per run before the pipeline stops calling out
    pub max_failed_calls: usize,
    pub flush_every: usize,
    pub pause_after_success_millis: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_file: PathBuf::from("ai_cache.json"),
            max_new_enrichments: 50,
            max_failed_calls: 3,
            flush_every: 5,
            pause_after_success_millis: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn pause_after_success(&self) -> Duration {
        Duration::from_millis(self.pause_after_success_millis)
    }
}

/// Shape of `jobradar.yaml`; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    site: SiteConfig,
    enrichment: EnrichmentConfig,
    pipeline: PipelineConfig,
}

/// Values given on the command line, applied last.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub max_new: Option<usize>,
    pub top_tags: Option<usize>,
    pub base_url: Option<String>,
    pub no_enrich: bool,
}

impl ConfigManager {
    /// Load all configuration layers
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let mut config = match &overrides.config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);

        if config.api_key.is_none() && config.pipeline.enabled {
            warn!(
                "{} not set, AI enrichment disabled; all jobs get placeholders",
                API_KEY_VAR
            );
        }

        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        Ok(Self {
            site: file.site,
            enrichment: file.enrichment,
            pipeline: file.pipeline,
            api_key: None,
        })
    }

    /// Environment layer; `lookup` is injectable so tests don't touch process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_VAR) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("JOBRADAR_LISTING_URL") {
            self.site.listing_url = url;
        }
        if let Some(url) = non_empty("JOBRADAR_BASE_URL") {
            self.site.base_url = url;
        }
        if let Some(url) = non_empty("JOBRADAR_ENRICHMENT_URL") {
            self.enrichment.endpoint = url;
        }
        if let Some(model) = non_empty("JOBRADAR_MODEL") {
            self.enrichment.model = model;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(dir) = &overrides.output_dir {
            self.site.output_dir = dir.clone();
        }
        if let Some(file) = &overrides.cache_file {
            self.pipeline.cache_file = file.clone();
        }
        if let Some(max_new) = overrides.max_new {
            self.pipeline.max_new_enrichments = max_new;
        }
        if let Some(top_tags) = overrides.top_tags {
            self.site.top_tags = top_tags;
        }
        if let Some(base_url) = &overrides.base_url {
            self.site.base_url = base_url.clone();
        }
        if overrides.no_enrich {
            self.pipeline.enabled = false;
        }
    }

    /// Enrichment runs only when enabled and a credential is present
    pub fn enrichment_enabled(&self) -> bool {
        self.pipeline.enabled && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConfigManager::default();
        assert_eq!(config.pipeline.max_new_enrichments, 50);
        assert_eq!(config.pipeline.flush_every, 5);
        assert_eq!(config.pipeline.max_failed_calls, 3);
        assert_eq!(config.site.top_tags, 10);
        assert_eq!(config.enrichment.max_attempts, 3);
        assert_eq!(config.enrichment.rate_limit_backoff(), Duration::from_secs(20));
        assert!(!config.enrichment_enabled());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
site:
  site_name: "TechJobs"
pipeline:
  max_new_enrichments: 7
"#;
        let config = ConfigManager::from_yaml(yaml).unwrap();
        assert_eq!(config.site.site_name, "TechJobs");
        assert_eq!(config.site.output_dir, PathBuf::from("job_board"));
        assert_eq!(config.pipeline.max_new_enrichments, 7);
        assert_eq!(config.pipeline.cache_file, PathBuf::from("ai_cache.json"));
        assert_eq!(config.enrichment.model, "gpt-4o-mini");
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            ConfigManager::from_yaml(include_str!("../../jobradar.example.yaml")).unwrap();
        assert_eq!(config.site.site_name, "RemoteRadar");
        assert_eq!(config.pipeline.flush_every, 5);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(ConfigManager::from_yaml("site: [unclosed").is_err());
    }

    #[test]
    fn test_env_then_cli_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (API_KEY_VAR, "sk-test"),
            ("JOBRADAR_BASE_URL", "https://env.example"),
            ("JOBRADAR_MODEL", "   "),
        ]);

        let mut config = ConfigManager::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.site.base_url, "https://env.example");
        assert_eq!(config.enrichment.model, "gpt-4o-mini");
        assert!(config.enrichment_enabled());

        config.apply_overrides(&CliOverrides {
            base_url: Some("https://cli.example".to_string()),
            max_new: Some(0),
            no_enrich: true,
            ..Default::default()
        });
        assert_eq!(config.site.base_url, "https://cli.example");
        assert_eq!(config.pipeline.max_new_enrichments, 0);
        assert!(!config.enrichment_enabled());
    }
}
