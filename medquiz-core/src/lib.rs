//! # MedQuiz Core
//!
//! Core library for medquiz, a literature-grounded medical quiz generator.
//! Provides PubMed retrieval, prompt rendering, text-generation backends with
//! a retry-if-short pipeline, and answer evaluation (ROUGE-L, BLEU, and a
//! semantic F1) aggregated per model.

pub mod config;
pub mod error;
pub mod eval;
pub mod generation;
pub mod literature;
pub mod pipeline;
pub mod prompt;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{QuizConfig, load_config};
pub use error::{QuizError, Result};
pub use eval::{AnswerEvaluator, GoldTable, ModelAnswers, ResultTable, ScoreRecord, evaluate_all};
pub use generation::{GenerationRequest, GenerationResult, MockGenerator, TextGenerator};
pub use literature::{ArticleFetcher, LiteratureSource, PubMedClient};
pub use pipeline::{MIN_EXPECTED_LINES, QuizPipeline, is_likely_incomplete, line_count};
pub use prompt::{PromptContextBuilder, PromptRenderer, TemplateContext};
pub use types::{Document, LiteratureRecord, QuestionSetKind};
