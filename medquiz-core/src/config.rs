//! Configuration system for medquiz.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/medquiz/config.toml` and/or `.medquiz/config.toml`
//! in the workspace directory.
//!
//! Secrets never live in the config itself. Each backend names the environment
//! variable holding its key (`api_key_env`), and the key is resolved once and
//! handed to the backend constructor.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizConfig {
    /// Literature backend configuration.
    #[serde(default)]
    pub literature: LiteratureConfig,
    /// Text-generation backend configuration.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Answer evaluation configuration.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl QuizConfig {
    /// Reject values that would break a pipeline invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_new_tokens == 0 {
            return Err(ConfigError::Invalid {
                message: "generation.max_new_tokens must be greater than 0".into(),
            });
        }
        if self.literature.max_results_per_query == 0 {
            return Err(ConfigError::Invalid {
                message: "literature.max_results_per_query must be greater than 0".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "generation.temperature ({}) is outside 0.0-2.0",
                    self.generation.temperature
                ),
            });
        }
        Ok(())
    }
}

/// PubMed E-utilities configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteratureConfig {
    /// E-utilities base URL.
    pub base_url: String,
    /// Tool name reported to NCBI.
    pub tool: String,
    /// Contact email reported to NCBI.
    pub email: String,
    /// Environment variable holding an optional NCBI API key.
    pub api_key_env: String,
    /// Records requested per query line.
    pub max_results_per_query: usize,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            tool: "medquiz".to_string(),
            email: "medquiz@example.com".to_string(),
            api_key_env: "NCBI_API_KEY".to_string(),
            max_results_per_query: 1,
            timeout_secs: 30,
        }
    }
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider name: "huggingface" or "openai" (any OpenAI-compatible server).
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Tokens requested per generation pass.
    pub max_new_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether sampling is enabled (greedy decoding otherwise).
    pub sampling_enabled: bool,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Transport-level retry policy.
    pub retry: RetryConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
            api_key_env: "HUGGINGFACE_API_KEY".to_string(),
            base_url: None,
            max_new_tokens: 1000,
            temperature: 0.6,
            sampling_enabled: true,
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Answer evaluation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Add sentence BLEU to every text score.
    pub include_bleu: bool,
    /// Embedding backend for the semantic similarity metric.
    pub embedding: EmbeddingConfig,
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default) or "openai".
    pub provider: String,
    /// Provider-specific model name.
    pub model: Option<String>,
    /// Optional base URL override.
    pub base_url: Option<String>,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Dimensionality of the local hashing embedder.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: 512,
        }
    }
}

/// Load configuration from all sources with layered merging.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&QuizConfig>,
) -> Result<QuizConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(QuizConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "medquiz", "medquiz") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".medquiz").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (MEDQUIZ_GENERATION__MODEL, MEDQUIZ_EVALUATION__INCLUDE_BLEU, etc.)
    figment = figment.merge(Env::prefixed("MEDQUIZ_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Read a secret from the named environment variable.
pub fn resolve_secret(env_var: &str) -> Result<String, ConfigError> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::EnvVarMissing {
            var: env_var.to_string(),
        }),
    }
}

/// Like [`resolve_secret`], but a missing variable is not an error.
pub fn resolve_optional_secret(env_var: &str) -> Option<String> {
    resolve_secret(env_var).ok()
}
