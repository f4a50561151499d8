// src/types/job.rs
//! Job listing records as delivered by the public job-board feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_TITLE: &str = "Unbekannte Position";
pub const DEFAULT_COMPANY: &str = "Unbekannt";
pub const DEFAULT_LOCATION: &str = "Remote";

/// One job listing. The feed's `slug` doubles as the stable id used as cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(alias = "slug")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_company")]
    pub company_name: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_created_at")]
    pub created_at: Option<String>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_company() -> String {
    DEFAULT_COMPANY.to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

/// The feed sends unix timestamps, older dumps carry date strings.
fn deserialize_created_at<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d").to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

impl JobRecord {
    /// Minimal record, mostly useful for tests and fixtures.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company_name: default_company(),
            location: default_location(),
            description: String::new(),
            remote: false,
            tags: Vec::new(),
            job_types: Vec::new(),
            url: String::new(),
            created_at: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `YYYY-MM-DD` prefix of `created_at`, if there is one.
    pub fn posted_date(&self) -> Option<&str> {
        self.created_at
            .as_deref()
            .map(|date| date.get(..10).unwrap_or(date))
    }
}
