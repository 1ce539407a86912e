//! OpenAI-compatible chat completion backend.
//!
//! Works with OpenAI, vLLM, Ollama, LM Studio and TGI's `/v1` route. The
//! prompt is sent as a single user message.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{
    GenerationRequest, GenerationResult, TextGenerator, map_http_error, map_send_error, with_retry,
};
use crate::config::{GenerationConfig, RetryConfig};
use crate::error::GenerationError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "OpenAI-compatible";

pub struct OpenAiCompatibleGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    retry: RetryConfig,
}

impl OpenAiCompatibleGenerator {
    /// `api_key` may be `None` for local servers that do not check it.
    pub fn new(
        config: &GenerationConfig,
        api_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("medquiz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    pub fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt()}],
            "max_tokens": request.max_new_tokens(),
            "stream": false,
        });
        // Greedy decoding when sampling is off
        body["temperature"] = if request.sampling_enabled() {
            json!(request.temperature())
        } else {
            json!(0.0)
        };
        body
    }

    /// Take `choices[0].message.content`; no choices means empty text.
    pub fn parse_response(json: &Value) -> Result<GenerationResult, GenerationError> {
        let choices = json
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| GenerationError::ResponseParse {
                message: "Missing 'choices' array".into(),
            })?;

        let Some(choice) = choices.first() else {
            return Ok(GenerationResult::default());
        };

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .ok_or_else(|| GenerationError::ResponseParse {
                message: "Missing 'message.content' in choice".into(),
            })?;

        Ok(GenerationResult::new(content.as_str().unwrap_or_default()))
    }

    async fn send_once(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let mut builder = self.client.post(&url).json(&self.build_body(request));
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::ApiRequest {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(map_http_error(PROVIDER, status, &body));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| GenerationError::ResponseParse {
            message: format!("Invalid JSON: {}", e),
        })?;

        Self::parse_response(&json)
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        with_retry(&self.retry, move || self.send_once(request)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
