//! Chat-completion client shared by the AI-backed resolvers.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol, which both the
//! sample identification upstream (OpenAI) and the video search upstream
//! (Perplexity) accept. Answers are requested as strict JSON against a schema
//! from [`prompt`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use samplefindr::ai::{ChatClient, ChatRequest};
//!
//! let client = ChatClient::new("sk-...", "https://api.openai.com/v1", "o3-mini");
//! let answer: serde_json::Value = client.complete_json(&request).await?;
//! ```

pub mod prompt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::api::logs::log_warning_indent;
use crate::config::{ProviderConfig, DEFAULT_AI_MAX_RETRIES, DEFAULT_AI_RETRY_DELAY};
use crate::error::{AiError, AiResult};

/// One structured-output request.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: String,
    pub schema_name: &'a str,
    pub schema: Value,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub seed: Option<u64>,
    /// Perplexity-only: `"web"` enables live search.
    pub search_mode: Option<&'a str>,
}

/// OpenAI-compatible chat-completion client
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: crate::config::http_client(crate::config::DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: DEFAULT_AI_MAX_RETRIES,
            retry_delay: DEFAULT_AI_RETRY_DELAY,
        }
    }

    /// Build from a provider section; `key_name` names the missing variable.
    pub fn from_provider(provider: &ProviderConfig, key_name: &'static str) -> AiResult<Self> {
        let api_key = provider
            .api_key
            .clone()
            .ok_or(AiError::MissingApiKey(key_name))?;
        Ok(Self::new(api_key, &provider.base_url, &provider.model))
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a request and parse the answer as `T`, retrying transient failures.
    pub async fn complete_json<T: DeserializeOwned>(&self, request: &ChatRequest<'_>) -> AiResult<T> {
        let mut attempt = 1;
        loop {
            let result = match self.call_api(request).await {
                Ok(content) => parse_content(&content),
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    log_warning_indent(
                        format!(
                            "{} attempt {}/{} failed: {}; retrying in {}ms",
                            self.model,
                            attempt,
                            self.max_retries,
                            e,
                            self.retry_delay.as_millis()
                        ),
                        1,
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn request_body(&self, request: &ChatRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema
                }
            }
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if let Some(mode) = request.search_mode {
            body["search_mode"] = json!(mode);
        }
        body
    }

    /// Single round-trip, returning the first choice's content.
    async fn call_api(&self, request: &ChatRequest<'_>) -> AiResult<String> {
        tracing::debug!(model = %self.model, schema = request.schema_name, "calling chat completions");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(AiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidJson(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

/// Parse model output as `T`, tolerating markdown fences and surrounding prose.
pub fn parse_content<T: DeserializeOwned>(content: &str) -> AiResult<T> {
    let json_str = extract_json(content);
    serde_json::from_str(json_str).map_err(|e| {
        AiError::InvalidJson(format!(
            "{}. Response was: {}",
            e,
            content.chars().take(200).collect::<String>()
        ))
    })
}

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let json_start = start + "```json".len();
        if let Some(len) = text[json_start..].find("```") {
            return text[json_start..json_start + len].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        // Skip language identifier if present
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);

        if let Some(len) = text[content_start..].find("```") {
            return text[content_start..content_start + len].trim();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    text.trim()
}
