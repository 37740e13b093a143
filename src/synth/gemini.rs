use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompts::{repair_prompt, synthesis_prompt};
use super::{clean_sql_response, QuerySynthesizer, SynthError};
use crate::exec::{Backoff, RetryPolicy};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-pro".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.1,
            max_output_tokens: 2000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Synthesizer backed by the Gemini `generateContent` REST endpoint
#[derive(Debug, Clone)]
pub struct GeminiSynthesizer {
    http_client: reqwest::Client,
    config: GeminiConfig,
    retry: RetryPolicy,
}

impl GeminiSynthesizer {
    pub fn new(config: GeminiConfig) -> Result<Self, SynthError> {
        if config.api_key.trim().is_empty() {
            return Err(SynthError::NotConfigured("GEMINI_API_KEY is empty".into()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SynthError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
            // Three tries: pauses of 1s then 2s
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_secs(1),
                backoff: Backoff::Exponential,
                jitter: Duration::ZERO,
            },
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    /// Send one prompt, retrying network errors, throttling and server errors
    async fn generate(&self, prompt: &str) -> Result<String, SynthError> {
        let mut retry = 0;

        loop {
            match self.generate_once(prompt).await {
                Err(e) if is_transient(&e) && retry < self.retry.max_retries => {
                    retry += 1;
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Gemini call failed: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, SynthError> {
        let response = self
            .http_client
            .post(self.url())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| SynthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SynthError::Deserialization(e.to_string()))?;

        parsed.text().ok_or(SynthError::Empty)
    }

    async fn generate_sql(&self, prompt: &str) -> Result<String, SynthError> {
        let sql = clean_sql_response(&self.generate(prompt).await?);
        if sql.is_empty() {
            return Err(SynthError::Empty);
        }
        Ok(sql)
    }
}

fn is_transient(err: &SynthError) -> bool {
    match err {
        SynthError::Network(_) | SynthError::Empty => true,
        SynthError::Remote { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl QuerySynthesizer for GeminiSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        schema_description: &str,
        dataset_name: &str,
    ) -> Result<String, SynthError> {
        tracing::info!(dataset = dataset_name, "Synthesizing SQL");
        let sql = self
            .generate_sql(&synthesis_prompt(question, schema_description, dataset_name))
            .await?;
        tracing::debug!(sql = %sql, "Synthesized candidate");
        Ok(sql)
    }

    async fn repair(
        &self,
        question: &str,
        failing_sql: &str,
        error: &str,
        schema_description: &str,
    ) -> Result<String, SynthError> {
        tracing::info!("Requesting repaired SQL");
        let sql = self
            .generate_sql(&repair_prompt(question, failing_sql, error, schema_description))
            .await?;
        tracing::debug!(sql = %sql, "Repaired candidate");
        Ok(sql)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
