//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! The client owns a small tokio runtime so the synchronous analysis
//! pipeline can call it from worker threads. Callers create it once per run
//! and release it with [`HttpModelClient::shutdown`].

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use archlens_core::config::AnalyzerConfig;
use archlens_core::error::UpstreamError;
use archlens_core::model::ModelClient;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatAnswer,
}

#[derive(Debug, Deserialize)]
struct ChatAnswer {
    content: Option<String>,
}

/// Model client backed by HTTP calls with a timeout and bounded retries.
pub struct HttpModelClient {
    http: reqwest::Client,
    runtime: Runtime,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl HttpModelClient {
    /// Create a client from analyzer settings. The API key is read from the
    /// environment variable named by `api_key_env`; without it requests are
    /// sent unauthenticated, which suits local model servers.
    pub fn new(config: &AnalyzerConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("archlens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("archlens-llm")
            .enable_all()
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to start runtime: {e}")))?;

        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "no analyzer API key set; sending unauthenticated requests"
            );
        }

        Ok(Self {
            http,
            runtime,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    /// Stop the client's runtime, waiting briefly for in-flight requests.
    pub fn shutdown(self) {
        debug!(model = %self.model, "shutting down analyzer client");
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }

    async fn request_once(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::InvalidResponse("response has no content".to_string()))
    }

    async fn request_with_retries(&self, prompt: &str) -> Result<String, UpstreamError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            match self.request_once(prompt).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, max = self.max_retries, "analyzer request failed, retrying: {e}");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl ModelClient for HttpModelClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete_json(&self, prompt: &str) -> Result<Value, UpstreamError> {
        let content = self.runtime.block_on(self.request_with_retries(prompt))?;
        extract_json(&content)
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex is valid")
    })
}

/// Parse the JSON value in a model answer. Accepts bare JSON, JSON inside a
/// Markdown code fence, or JSON surrounded by prose.
pub fn extract_json(content: &str) -> Result<Value, UpstreamError> {
    let body = fence_regex()
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or(content, |m| m.as_str())
        .trim();

    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    let start = body.find(['{', '[']);
    let end = body.rfind(['}', ']']);
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&body[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(UpstreamError::InvalidResponse(format!(
        "answer is not JSON: {}",
        content.chars().take(200).collect::<String>()
    )))
}
