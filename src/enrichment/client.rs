// src/enrichment/client.rs
use super::error::EnrichError;
use super::types::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};
use super::Enricher;
use crate::core::config_manager::EnrichmentConfig;
use crate::types::{EnrichmentResult, JobRecord, RawEnrichment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use crate::template_processor::TemplateProcessor;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct EnrichmentClient {
    client: Client,
    api_key: Option<String>,
    settings: EnrichmentConfig,
}

impl EnrichmentClient {
    pub fn new(settings: EnrichmentConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One enrichment with bounded retries. Rate limits back off by
    /// `attempt * rate_limit_backoff`, transport errors by a fixed short delay.
    pub async fn try_analyze(&self, job: &JobRecord) -> Result<EnrichmentResult, EnrichError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EnrichError::Config("no API key configured".into()))?;

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(
                job,
                self.settings.description_prefix_chars,
            ))],
            temperature: self.settings.temperature,
            response_format: ResponseFormat::json_object(),
        };

        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.send_once(api_key, &request).await {
                Ok(content) => return parse_enrichment(&content),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(error);
            }

            let delay = retry_delay(&self.settings, &error, attempt);
            warn!(
                job_id = %job.id,
                attempt,
                max_attempts,
                delay_secs = delay.as_secs(),
                "Enrichment attempt failed ({}), retrying",
                error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send_once(&self, api_key: &str, request: &ChatRequest) -> Result<String, EnrichError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EnrichError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;
        let chat: ChatResponse =
            serde_json::from_str(&body).map_err(|e| EnrichError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EnrichError::Parse("response has no completion content".into()))
    }
}

#[async_trait]
impl Enricher for EnrichmentClient {
    async fn analyze(&self, job: &JobRecord) -> Option<EnrichmentResult> {
        if !self.is_configured() {
            debug!(job_id = %job.id, "Enrichment skipped, no API key");
            return None;
        }

        match self.try_analyze(job).await {
            Ok(result) => {
                info!(job_id = %job.id, "Enriched job: {}", job.title);
                Some(result)
            }
            Err(e) => {
                warn!(job_id = %job.id, "Enrichment failed, using placeholder: {}", e);
                None
            }
        }
    }
}

pub fn build_prompt(job: &JobRecord, prefix_chars: usize) -> String {
    format!(
        r#"You are a recruiting analyst for a German tech job board.

JOB TITLE: {}
COMPANY: {}
DESCRIPTION (excerpt):
{}

TASK: Reply with a JSON object that has exactly two fields:
- "salary_estimate": a realistic annual gross salary range in EUR for this role in Germany, e.g. "55.000 - 70.000 €"
- "summary": a short, motivating two-sentence pitch for candidates, written in German

Reply with the JSON object only."#,
        job.title,
        job.company_name,
        TemplateProcessor::text_excerpt(&job.description, prefix_chars)
    )
}

/// Wait before the next attempt: `attempt * rate_limit_backoff` after a 429,
/// the fixed network delay after anything else retryable.
pub fn retry_delay(settings: &EnrichmentConfig, error: &EnrichError, attempt: u32) -> Duration {
    match error {
        EnrichError::RateLimited => settings.rate_limit_backoff() * attempt,
        _ => settings.network_retry_delay(),
    }
}

/// Decode the completion content into a normalized result.
pub fn parse_enrichment(content: &str) -> Result<EnrichmentResult, EnrichError> {
    let json = strip_code_fence(content);
    let raw: RawEnrichment =
        serde_json::from_str(json).map_err(|e| EnrichError::Parse(e.to_string()))?;
    raw.normalize()
        .ok_or_else(|| EnrichError::Parse("payload has no usable summary".into()))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn fast_settings(endpoint: String) -> EnrichmentConfig {
        EnrichmentConfig {
            endpoint,
            rate_limit_backoff_secs: 0,
            network_retry_secs: 0,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn job() -> JobRecord {
        JobRecord::new("rust-dev-1", "Rust Developer")
            .with_description("<p>We build <b>fast</b> services.</p><ul><li>Tokio</li></ul>")
    }

    /// Serves the same canned HTTP response to every connection and counts requests.
    async fn spawn_canned_server(status: u16, body: String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let response = format!(
                        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/v1/chat/completions", addr), hits)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Reads each request, then hangs up without answering.
    async fn spawn_hangup_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    drop(socket);
                });
            }
        });

        (format!("http://{}/v1/chat/completions", addr), hits)
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn test_prompt_contains_job_and_trimmed_excerpt() {
        let long = format!("<p>{}</p>", "x".repeat(1000));
        let job = JobRecord::new("id", "Data Engineer").with_description(long);
        let prompt = build_prompt(&job, 400);

        assert!(prompt.contains("JOB TITLE: Data Engineer"));
        assert!(prompt.contains("COMPANY: Unbekannt"));
        assert!(prompt.contains(&"x".repeat(400)));
        assert!(!prompt.contains(&"x".repeat(401)));
        assert!(prompt.contains("\"salary_estimate\""));
        assert!(prompt.contains("\"summary\""));
    }

    #[test]
    fn test_retry_delay_schedule() {
        let settings = EnrichmentConfig::default();

        assert_eq!(
            retry_delay(&settings, &EnrichError::RateLimited, 1),
            Duration::from_secs(20)
        );
        assert_eq!(
            retry_delay(&settings, &EnrichError::RateLimited, 2),
            Duration::from_secs(40)
        );
        assert_eq!(
            retry_delay(&settings, &EnrichError::Network("reset".into()), 1),
            Duration::from_secs(5)
        );
        assert_eq!(
            retry_delay(&settings, &EnrichError::Network("reset".into()), 2),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_parse_enrichment_variants() {
        let plain = parse_enrichment(r#"{"salary_estimate": "60k", "summary": "Top"}"#).unwrap();
        assert_eq!(plain.summary, "Top");

        let fenced =
            parse_enrichment("```json\n{\"salary_estimate\": \"60k\", \"summary\": [\"A.\", \"B.\"]}\n```")
                .unwrap();
        assert_eq!(fenced.summary, "A. B.");

        assert!(matches!(
            parse_enrichment("Sorry, I cannot help with that."),
            Err(EnrichError::Parse(_))
        ));
        assert!(matches!(
            parse_enrichment(r#"{"salary_estimate": "60k"}"#),
            Err(EnrichError::Parse(_))
        ));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.3,
            response_format: ResponseFormat::json_object(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn test_missing_api_key_returns_none_without_request() {
        let (url, hits) = spawn_canned_server(200, completion("{}")).await;
        let client = EnrichmentClient::new(fast_settings(url), None).unwrap();

        assert!(!client.is_configured());
        assert!(client.analyze(&job()).await.is_none());
        assert!(matches!(
            client.try_analyze(&job()).await,
            Err(EnrichError::Config(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_parses_completion() {
        let content = r#"{"salary_estimate": "65.000 - 80.000 €", "summary": ["Spannendes Team.", "Voll remote."]}"#;
        let (url, hits) = spawn_canned_server(200, completion(content)).await;
        let client = EnrichmentClient::new(fast_settings(url), Some("sk-test".into())).unwrap();

        let result = client.analyze(&job()).await.unwrap();
        assert_eq!(result.salary_estimate, "65.000 - 80.000 €");
        assert_eq!(result.summary, "Spannendes Team. Voll remote.");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_up_to_max_attempts() {
        let (url, hits) = spawn_canned_server(429, "{}".to_string()).await;
        let client = EnrichmentClient::new(fast_settings(url), Some("sk-test".into())).unwrap();

        assert!(matches!(
            client.try_analyze(&job()).await,
            Err(EnrichError::RateLimited)
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (url, hits) = spawn_canned_server(500, r#"{"error": "boom"}"#.to_string()).await;
        let client = EnrichmentClient::new(fast_settings(url), Some("sk-test".into())).unwrap();

        match client.try_analyze(&job()).await {
            Err(EnrichError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_completion_is_not_retried() {
        let (url, hits) = spawn_canned_server(200, completion("not json at all")).await;
        let client = EnrichmentClient::new(fast_settings(url), Some("sk-test".into())).unwrap();

        assert!(client.analyze(&job()).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_service_gives_up_with_network_error() {
        let client = EnrichmentClient::new(
            fast_settings("http://127.0.0.1:9/v1/chat/completions".to_string()),
            Some("sk-test".into()),
        )
        .unwrap();

        assert!(matches!(
            client.try_analyze(&job()).await,
            Err(EnrichError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_connections_are_retried_up_to_max_attempts() {
        let (url, hits) = spawn_hangup_server().await;
        let client = EnrichmentClient::new(fast_settings(url), Some("sk-test".into())).unwrap();

        assert!(matches!(
            client.try_analyze(&job()).await,
            Err(EnrichError::Network(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(client.analyze(&job()).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }
}
