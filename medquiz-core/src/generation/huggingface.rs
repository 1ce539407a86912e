//! Hugging Face serverless Inference API backend (text-generation task).

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

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
const PROVIDER: &str = "huggingface";

pub struct HuggingFaceGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    retry: RetryConfig,
}

impl HuggingFaceGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("medquiz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    /// Request body for the text-generation task. Only the continuation is
    /// requested, not the echoed prompt.
    pub fn build_body(request: &GenerationRequest) -> Value {
        json!({
            "inputs": request.prompt(),
            "parameters": {
                "max_new_tokens": request.max_new_tokens(),
                "temperature": request.temperature(),
                "do_sample": request.sampling_enabled(),
                "return_full_text": false,
            },
        })
    }

    /// Read the first reply from `[{"generated_text": ...}]`. No replies
    /// means empty text.
    pub fn parse_response(json: &Value) -> Result<GenerationResult, GenerationError> {
        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(GenerationError::ApiRequest {
                message: err.to_string(),
            });
        }

        let first = match json {
            Value::Array(replies) => match replies.first() {
                Some(reply) => reply,
                None => return Ok(GenerationResult::default()),
            },
            Value::Object(_) => json,
            _ => {
                return Err(GenerationError::ResponseParse {
                    message: "Expected an array of generations".into(),
                });
            }
        };

        first
            .get("generated_text")
            .and_then(|t| t.as_str())
            .map(GenerationResult::new)
            .ok_or_else(|| GenerationError::ResponseParse {
                message: "Missing 'generated_text' in reply".into(),
            })
    }

    async fn send_once(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let url = self.endpoint();
        debug!(url = %url, model = %self.model, "Sending text-generation request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::build_body(request))
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
impl TextGenerator for HuggingFaceGenerator {
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
