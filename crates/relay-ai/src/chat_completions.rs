use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};

use crate::{CompletionClient, Message, UpstreamError, UpstreamReply};

#[derive(Debug, Clone, PartialEq)]
/// Fixed sampling and limit parameters attached to every upstream request.
pub struct GenerationParameters {
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub max_tokens: u32,
    pub max_completion_tokens: Option<u32>,
    /// Provider-specific top-level body fields merged in verbatim.
    pub extra_body: Map<String, Value>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        let mut extra_body = Map::new();
        extra_body.insert(
            "venice_parameters".to_string(),
            json!({
                "enable_web_search": "on",
                "include_venice_system_prompt": true,
            }),
        );
        Self {
            temperature: 1.0,
            top_p: 0.1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 1000,
            max_completion_tokens: Some(998),
            extra_body,
        }
    }
}

#[derive(Debug, Clone)]
/// Static configuration for `ChatCompletionsClient`.
pub struct ChatCompletionsConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout_ms: u64,
    pub generation: GenerationParameters,
}

#[derive(Debug, Clone)]
/// Chat-completions client backed by one pooled `reqwest::Client`.
///
/// Cloning shares the underlying connection pool.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, UpstreamError> {
        if config.api_key.trim().is_empty() {
            return Err(UpstreamError::MissingApiKey);
        }
        if config.model.trim().is_empty() {
            return Err(UpstreamError::InvalidConfig(
                "model identifier cannot be empty".to_string(),
            ));
        }
        reqwest::Url::parse(config.api_url.trim()).map_err(|e| {
            UpstreamError::InvalidConfig(format!("invalid api url '{}': {e}", config.api_url))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        let mut bearer = HeaderValue::from_str(&bearer)
            .map_err(|e| UpstreamError::InvalidConfig(format!("invalid API key header: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, context: &[Message]) -> Result<UpstreamReply, UpstreamError> {
        let body = build_chat_request_body(&self.config, context);
        tracing::debug!(
            model = %self.config.model,
            messages = context.len(),
            "sending upstream completion request"
        );

        let response = self
            .client
            .post(self.config.api_url.trim())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed = serde_json::from_str::<Value>(&raw)?;
        Ok(UpstreamReply::from_body(&parsed))
    }
}

fn build_chat_request_body(config: &ChatCompletionsConfig, context: &[Message]) -> Value {
    let generation = &config.generation;
    let mut body = json!({
        "model": config.model,
        "messages": context,
        "frequency_penalty": generation.frequency_penalty,
        "presence_penalty": generation.presence_penalty,
        "max_tokens": generation.max_tokens,
        "temperature": generation.temperature,
        "top_p": generation.top_p,
        "stream": false,
    });
    if let Some(max_completion_tokens) = generation.max_completion_tokens {
        body["max_completion_tokens"] = json!(max_completion_tokens);
    }
    if let Some(object) = body.as_object_mut() {
        for (key, value) in &generation.extra_body {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    body
}
