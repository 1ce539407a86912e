//! Error types for the medquiz core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering literature retrieval, prompt rendering, generation, evaluation,
//! and configuration.

use std::path::PathBuf;

/// Top-level error type for the medquiz core library.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Literature error: {0}")]
    Literature(#[from] LiteratureError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the literature backend.
#[derive(Debug, thiserror::Error)]
pub enum LiteratureError {
    #[error("Literature request failed: {message}")]
    Request { message: String },

    #[error("Literature backend returned status {status}")]
    Status { status: u16 },

    #[error("Literature response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from prompt template compilation and rendering.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt template is invalid: {message}")]
    Template { message: String },

    #[error("Prompt rendering failed: {message}")]
    Render { message: String },
}

/// Errors from text-generation backend interactions.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Invalid generation request: {message}")]
    InvalidRequest { message: String },
}

/// Errors from answer evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Question '{question_id}' has no gold answer")]
    UnknownQuestion { question_id: String },

    #[error("Answer to '{question_id}' does not match a {expected} question")]
    AnswerShapeMismatch {
        question_id: String,
        expected: String,
    },

    #[error("Metric '{metric}' failed: {message}")]
    Metric { metric: String, message: String },

    #[error("Failed to load answers from {path}: {message}")]
    Load { path: PathBuf, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `QuizError`.
pub type Result<T> = std::result::Result<T, QuizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_generation() {
        let err = QuizError::Generation(GenerationError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Generation error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_evaluation() {
        let err = QuizError::Evaluation(EvaluationError::UnknownQuestion {
            question_id: "MCQ9".into(),
        });
        assert_eq!(
            err.to_string(),
            "Evaluation error: Question 'MCQ9' has no gold answer"
        );
    }

    #[test]
    fn test_error_display_shape_mismatch() {
        let err = EvaluationError::AnswerShapeMismatch {
            question_id: "MCQ1".into(),
            expected: "multiple-choice".into(),
        };
        assert_eq!(
            err.to_string(),
            "Answer to 'MCQ1' does not match a multiple-choice question"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = QuizError::Config(ConfigError::EnvVarMissing {
            var: "HUGGINGFACE_API_KEY".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable not set: HUGGINGFACE_API_KEY"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuizError = io_err.into();
        assert!(matches!(err, QuizError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: QuizError = serde_err.into();
        assert!(matches!(err, QuizError::Serialization(_)));
    }

    #[test]
    fn test_generation_error_variants() {
        let err = GenerationError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited by provider, retry after 60s");

        let err = LiteratureError::Status { status: 503 };
        assert_eq!(err.to_string(), "Literature backend returned status 503");
    }
}
