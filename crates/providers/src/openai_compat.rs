//! OpenAI-compatible generation and embedding clients.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` and `/embeddings`.
//!
//! HTTP failures are classified for the fallback controller:
//! 429 → rate limited, 408/5xx/network → transient, 401/403 → authentication,
//! 404 → unknown model, any other 4xx → fatal API error.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use voltrag_core::{CollaboratorError, Embedder, GenerationError, Generator};

/// System prompt sent with every generation request.
pub const GROUNDING_SYSTEM_PROMPT: &str = "You are a battery engineering assistant. \
Answer only from the battery data, conversation memory and pack calculation supplied \
in the user message. When the supplied data does not contain the answer, say so \
plainly instead of guessing. Quote numeric values with their units.";

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Map a non-success HTTP status to a classified generation error.
///
/// `retry_after_secs` is the provider's `Retry-After` hint, if it sent one.
pub fn classify_status(
    status: u16,
    model: &str,
    body: String,
    retry_after_secs: Option<u64>,
) -> GenerationError {
    match status {
        429 => GenerationError::RateLimited { retry_after_secs },
        401 | 403 => GenerationError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => GenerationError::ModelNotFound(model.to_string()),
        _ => GenerationError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Delay-seconds form of a `Retry-After` header; HTTP dates are ignored.
fn parse_retry_after(header: Option<&str>) -> Option<u64> {
    header?.trim().parse().ok()
}

fn classify_transport(err: &reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(err.to_string())
    } else {
        GenerationError::Network(err.to_string())
    }
}

// ── Generation ────────────────────────────────────────────────────────────

/// Chat-completions backed [`Generator`].
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: normalize_base_url(base_url),
            api_key: api_key.into(),
            temperature: 0.2,
            max_tokens: 1024,
            client: build_client(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request_body(&self, model_id: &str, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": model_id,
            "messages": [
                { "role": "system", "content": GROUNDING_SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        })
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(model_id, prompt);

        debug!(
            provider = %self.name,
            model = %model_id,
            prompt_chars = prompt.chars().count(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, model = %model_id, body = %error_body, "Provider returned error");
            return Err(classify_status(status, model_id, error_body, retry_after));
        }

        let api_response: ChatResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }
}

// ── Embedding ─────────────────────────────────────────────────────────────

/// `/embeddings` backed [`Embedder`].
pub struct OpenAiCompatEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OpenAiCompatEmbedder {
    /// `dimensions` is requested from the model and checked on every
    /// response; `text-embedding-3-*` models can shorten their vectors.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            client: build_client(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiCompatEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
            "encoding_format": "float",
            "dimensions": self.dimensions,
        });

        debug!(model = %self.model, chars = text.chars().count(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Embedding(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Embedding(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let api_resp: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Embedding(format!("Failed to parse response: {e}")))?;

        let vector = api_resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CollaboratorError::Embedding("No embedding in response".into()))?;

        if vector.len() != self.dimensions {
            return Err(CollaboratorError::Embedding(format!(
                "model returned {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(vector)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_name() {
        let generator = OpenAiCompatGenerator::new("openai", "https://api.openai.com/v1", "sk");
        assert_eq!(generator.name(), "openai");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let generator = OpenAiCompatGenerator::new("local", "http://localhost:11434/v1/", "x");
        assert_eq!(generator.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn request_body_carries_system_prompt_and_context() {
        let generator = OpenAiCompatGenerator::new("openai", "https://api.openai.com/v1", "sk")
            .with_temperature(0.5)
            .with_max_tokens(64);
        let body = generator.request_body("gpt-4o-mini", "=== QUESTION ===\nhi");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], GROUNDING_SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["content"], "=== QUESTION ===\nhi");
        assert_eq!(body["max_tokens"], 64);
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(429, "m", String::new(), None).is_transient());
        assert!(classify_status(503, "m", String::new(), None).is_transient());
        assert!(classify_status(408, "m", String::new(), None).is_transient());
        assert!(matches!(
            classify_status(401, "m", String::new(), None),
            GenerationError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_status(404, "gpt-x", String::new(), None),
            GenerationError::ModelNotFound(m) if m == "gpt-x"
        ));
        assert!(!classify_status(400, "m", "bad".into(), None).is_transient());
    }

    #[test]
    fn rate_limit_carries_retry_after_header() {
        let secs = parse_retry_after(Some(" 12 "));
        assert_eq!(secs, Some(12));
        match classify_status(429, "m", String::new(), secs) {
            GenerationError::RateLimited { retry_after_secs } => {
                assert_eq!(retry_after_secs, Some(12))
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2026 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);

        let message = classify_status(429, "m", String::new(), None).to_string();
        assert_eq!(message, "Rate limited by provider");
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{"id":"x","model":"gpt-4o-mini","choices":[{"index":0,"message":{"role":"assistant","content":"7.4 V"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("7.4 V"));
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }
}
