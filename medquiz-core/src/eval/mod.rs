//! Answer evaluation.
//!
//! Loads gold and model answers, scores each answer by its question kind,
//! and collects the scores into a [`ResultTable`].

pub mod aggregate;
pub mod answers;
pub mod evaluator;
pub mod metrics;
pub mod report;
pub mod semantic;

pub use aggregate::{ResultTable, evaluate_all};
pub use answers::{GoldAnswer, GoldTable, ModelAnswer, ModelAnswers};
pub use evaluator::{AnswerEvaluator, ScoreRecord, SemanticScore, TextScores, evaluate_mcq};
pub use metrics::{rouge_l, sentence_bleu};
pub use report::{ModelSeries, ReportSeries};
pub use semantic::{
    Embedder, GreedyMatchScorer, HashingEmbedder, OpenAiEmbedder, SemanticScorer, create_scorer,
};
