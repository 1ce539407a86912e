//! Text-generation backends.
//!
//! Provides implementations of the `TextGenerator` trait for:
//! - The Hugging Face serverless Inference API (text-generation task)
//! - OpenAI-compatible chat completion servers (OpenAI, vLLM, Ollama, TGI)
//!
//! Use `create_generator()` to instantiate the backend named in config.

pub mod huggingface;
pub mod mock;
pub mod openai_compat;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{GenerationConfig, RetryConfig, resolve_secret};
use crate::error::GenerationError;

pub use huggingface::HuggingFaceGenerator;
pub use mock::MockGenerator;
pub use openai_compat::OpenAiCompatibleGenerator;

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    max_new_tokens: u32,
    temperature: f32,
    sampling_enabled: bool,
}

impl GenerationRequest {
    /// Build a request. `max_new_tokens` must be positive.
    pub fn new(
        prompt: impl Into<String>,
        max_new_tokens: u32,
        temperature: f32,
        sampling_enabled: bool,
    ) -> Result<Self, GenerationError> {
        if max_new_tokens == 0 {
            return Err(GenerationError::InvalidRequest {
                message: "max_new_tokens must be greater than 0".into(),
            });
        }
        Ok(Self {
            prompt: prompt.into(),
            max_new_tokens,
            temperature,
            sampling_enabled,
        })
    }

    /// Build a request with the token budget and sampling settings from config.
    pub fn from_config(
        prompt: impl Into<String>,
        config: &GenerationConfig,
    ) -> Result<Self, GenerationError> {
        Self::new(
            prompt,
            config.max_new_tokens,
            config.temperature,
            config.sampling_enabled,
        )
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn sampling_enabled(&self) -> bool {
        self.sampling_enabled
    }
}

/// Generated text. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    pub text: String,
}

impl GenerationResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Run `send` until it succeeds, fails permanently, or `policy.max_retries`
/// extra attempts are used up.
///
/// Only rate limits and transport failures are retried. A Hugging Face model
/// that is still loading answers 503 with `estimated_time`, which arrives here
/// as `RateLimited`, so the wait covers the model's load time.
pub(crate) async fn with_retry<F, Fut, T>(
    policy: &RetryConfig,
    send: F,
) -> Result<T, GenerationError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut retries = 0;
    loop {
        let err = match send().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retries >= policy.max_retries || !is_transient(&err) {
            return Err(err);
        }

        let delay = retry_delay(policy, retries, &err);
        retries += 1;
        tracing::warn!(
            retry = retries,
            of = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Generation request failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn is_transient(err: &GenerationError) -> bool {
    matches!(
        err,
        GenerationError::RateLimited { .. }
            | GenerationError::Connection { .. }
            | GenerationError::Timeout { .. }
    )
}

/// Wait before the next attempt: exponential in `retries`, capped at
/// `max_backoff_ms`, never shorter than the wait a rate limit asked for.
fn retry_delay(policy: &RetryConfig, retries: u32, err: &GenerationError) -> Duration {
    let scaled = policy.initial_backoff_ms as f64 * policy.backoff_multiplier.powi(retries as i32);
    let mut ms = scaled.min(policy.max_backoff_ms as f64) as u64;
    if policy.jitter {
        ms += ms * clock_jitter_percent() / 100;
    }
    if let GenerationError::RateLimited { retry_after_secs } = err {
        ms = ms.max(retry_after_secs * 1000);
    }
    Duration::from_millis(ms)
}

/// 0 to 25, from the clock's sub-second nanos.
fn clock_jitter_percent() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 26)
}

/// Map a non-success HTTP status to a `GenerationError`.
pub(crate) fn map_http_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> GenerationError {
    match status.as_u16() {
        401 | 403 => {
            tracing::debug!(body = %body, status = status.as_u16(), "Authentication failed");
            GenerationError::AuthFailed {
                provider: provider.to_string(),
            }
        }
        429 => GenerationError::RateLimited {
            retry_after_secs: parse_retry_after(body).unwrap_or(5),
        },
        // The HF inference API answers 503 while a cold model loads
        503 => match parse_estimated_time(body) {
            Some(secs) => GenerationError::RateLimited {
                retry_after_secs: secs,
            },
            None => GenerationError::ApiRequest {
                message: format!("Server error (503): {}", body),
            },
        },
        code if code >= 500 => GenerationError::ApiRequest {
            message: format!("Server error ({}): {}", code, body),
        },
        code => GenerationError::ApiRequest {
            message: format!("HTTP {}: {}", code, body),
        },
    }
}

/// Pull "... try again in 12s" out of an error body.
fn parse_retry_after(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = json
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())?;
    message
        .split("in ")
        .last()
        .and_then(|s| {
            s.trim()
                .trim_end_matches('.')
                .trim_end_matches('s')
                .parse::<u64>()
                .ok()
        })
}

fn parse_estimated_time(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("estimated_time")
        .and_then(|t| t.as_f64())
        .map(|t| t.ceil().max(1.0) as u64)
}

/// Map a transport failure (no HTTP status) to a `GenerationError`.
pub(crate) fn map_send_error(err: reqwest::Error, timeout_secs: u64) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout { timeout_secs }
    } else if err.is_connect() {
        GenerationError::Connection {
            message: err.to_string(),
        }
    } else {
        GenerationError::ApiRequest {
            message: format!("Request failed: {}", err),
        }
    }
}

/// Create the generator named by `config.provider`, resolving its API key
/// from the environment variable in `config.api_key_env`.
///
/// Local OpenAI-compatible servers (a `base_url` on localhost) may run
/// without a key.
pub fn create_generator(
    config: &GenerationConfig,
) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let is_local = config
        .base_url
        .as_deref()
        .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"));

    let api_key = match resolve_secret(&config.api_key_env) {
        Ok(key) => Some(key),
        Err(_) if is_local => None,
        Err(_) => {
            return Err(GenerationError::AuthFailed {
                provider: format!("env var '{}' not set", config.api_key_env),
            });
        }
    };

    create_generator_with_key(config, api_key)
}

/// Create a generator with an already-resolved API key.
pub fn create_generator_with_key(
    config: &GenerationConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    match config.provider.as_str() {
        "huggingface" | "hf" => {
            let key = api_key.ok_or_else(|| GenerationError::AuthFailed {
                provider: "huggingface".into(),
            })?;
            Ok(Arc::new(HuggingFaceGenerator::new(config, key)?))
        }
        "openai" | "openai-compatible" | "vllm" | "ollama" => {
            Ok(Arc::new(OpenAiCompatibleGenerator::new(config, api_key)?))
        }
        other => Err(GenerationError::InvalidRequest {
            message: format!("Unknown generation provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_request_rejects_zero_tokens() {
        let err = GenerationRequest::new("prompt", 0, 0.6, true).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest { .. }));
    }

    #[test]
    fn test_request_from_config() {
        let config = GenerationConfig::default();
        let req = GenerationRequest::from_config("hello", &config).unwrap();
        assert_eq!(req.prompt(), "hello");
        assert_eq!(req.max_new_tokens(), 1000);
        assert!((req.temperature() - 0.6).abs() < f32::EPSILON);
        assert!(req.sampling_enabled());
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast_retry(2), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GenerationError::Connection {
                    message: "reset".into(),
                })
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&fast_retry(2), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Timeout { timeout_secs: 1 })
        })
        .await;
        assert!(matches!(result, Err(GenerationError::Timeout { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_permanent_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&fast_retry(3), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::AuthFailed {
                provider: "huggingface".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(GenerationError::AuthFailed { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let policy = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let reset = GenerationError::Connection {
            message: "reset".into(),
        };
        assert_eq!(retry_delay(&policy, 0, &reset), Duration::from_millis(100));
        assert_eq!(retry_delay(&policy, 1, &reset), Duration::from_millis(200));
        assert_eq!(retry_delay(&policy, 5, &reset), Duration::from_millis(500));

        // A cold model asking for 2s waits the full 2s
        let loading = GenerationError::RateLimited {
            retry_after_secs: 2,
        };
        assert_eq!(
            retry_delay(&policy, 0, &loading),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn test_retry_delay_jitter_is_bounded() {
        let policy = RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1000,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            jitter: true,
        };
        let timeout = GenerationError::Timeout { timeout_secs: 1 };
        for _ in 0..20 {
            let ms = retry_delay(&policy, 0, &timeout).as_millis();
            assert!((1000..=1250).contains(&ms), "delay = {ms}");
        }
    }

    #[test]
    fn test_map_http_error() {
        use reqwest::StatusCode;

        assert!(matches!(
            map_http_error("huggingface", StatusCode::UNAUTHORIZED, ""),
            GenerationError::AuthFailed { .. }
        ));
        assert!(matches!(
            map_http_error(
                "openai",
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"message":"Rate limit reached, try again in 12s"}}"#
            ),
            GenerationError::RateLimited {
                retry_after_secs: 12
            }
        ));
        assert!(matches!(
            map_http_error("openai", StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationError::RateLimited {
                retry_after_secs: 5
            }
        ));
        assert!(matches!(
            map_http_error(
                "huggingface",
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"error":"Model is currently loading","estimated_time":20.4}"#
            ),
            GenerationError::RateLimited {
                retry_after_secs: 21
            }
        ));
        assert!(matches!(
            map_http_error("huggingface", StatusCode::BAD_GATEWAY, "oops"),
            GenerationError::ApiRequest { .. }
        ));
        assert!(matches!(
            map_http_error("huggingface", StatusCode::BAD_REQUEST, "bad"),
            GenerationError::ApiRequest { .. }
        ));
    }

    #[test]
    fn test_create_generator_with_key_routes_by_provider() {
        let mut config = GenerationConfig::default();
        let generator = create_generator_with_key(&config, Some("hf_test".into())).unwrap();
        assert_eq!(
            generator.model_name(),
            "mistralai/Mixtral-8x7B-Instruct-v0.1"
        );

        config.provider = "openai".into();
        config.model = "llama3.1:8b".into();
        config.base_url = Some("http://localhost:11434/v1".into());
        let generator = create_generator_with_key(&config, None).unwrap();
        assert_eq!(generator.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_create_generator_requires_hf_key() {
        let config = GenerationConfig::default();
        assert!(matches!(
            create_generator_with_key(&config, None).err(),
            Some(GenerationError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_create_generator_missing_env_var() {
        let config = GenerationConfig {
            api_key_env: "MEDQUIZ_TEST_UNSET_GENERATION_KEY".into(),
            ..GenerationConfig::default()
        };
        assert!(matches!(
            create_generator(&config).err(),
            Some(GenerationError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_create_generator_unknown_provider() {
        let config = GenerationConfig {
            provider: "carrier-pigeon".into(),
            ..GenerationConfig::default()
        };
        assert!(matches!(
            create_generator_with_key(&config, Some("k".into())).err(),
            Some(GenerationError::InvalidRequest { .. })
        ));
    }
}
