//! Per-question answer scoring.
//!
//! Dispatch is on the gold answer's kind:
//! - multiple-choice: exact answer match (case- and whitespace-insensitive),
//!   plus text scores for the explanation
//! - short answer: ROUGE-L, semantic F1, and optionally BLEU
//! - case-based: semantic F1 only

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::answers::{GoldAnswer, GoldTable, ModelAnswer};
use super::metrics::{rouge_l, sentence_bleu};
use super::semantic::{SemanticScorer, create_scorer};
use crate::config::EvaluationConfig;
use crate::error::{EvaluationError, QuizError};

/// Lexical and semantic scores for a free-text answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScores {
    #[serde(rename = "ROUGE-L")]
    pub rouge_l: f64,
    #[serde(rename = "BLEU", default, skip_serializing_if = "Option::is_none")]
    pub bleu: Option<f64>,
    #[serde(rename = "BERTScore")]
    pub semantic_f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticScore {
    #[serde(rename = "BERTScore")]
    pub semantic_f1: f64,
}

/// Score for one question, serialized with the report's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreRecord {
    Mcq {
        #[serde(rename = "Correct")]
        correct: bool,
        #[serde(rename = "Explanation Scores")]
        explanation_scores: TextScores,
    },
    ShortAnswer(TextScores),
    CaseBased(SemanticScore),
}

impl ScoreRecord {
    /// ROUGE-L of the answer (or explanation); `None` for case-based scores.
    pub fn rouge_l(&self) -> Option<f64> {
        match self {
            Self::Mcq {
                explanation_scores, ..
            } => Some(explanation_scores.rouge_l),
            Self::ShortAnswer(scores) => Some(scores.rouge_l),
            Self::CaseBased(_) => None,
        }
    }

    pub fn semantic_f1(&self) -> f64 {
        match self {
            Self::Mcq {
                explanation_scores, ..
            } => explanation_scores.semantic_f1,
            Self::ShortAnswer(scores) => scores.semantic_f1,
            Self::CaseBased(score) => score.semantic_f1,
        }
    }
}

/// Case- and surrounding-whitespace-insensitive answer match.
pub fn evaluate_mcq(model_answer: &str, gold_answer: &str) -> bool {
    model_answer.trim().to_lowercase() == gold_answer.trim().to_lowercase()
}

pub struct AnswerEvaluator {
    semantic: Arc<dyn SemanticScorer>,
    include_bleu: bool,
}

impl AnswerEvaluator {
    pub fn new(semantic: Arc<dyn SemanticScorer>, include_bleu: bool) -> Self {
        Self {
            semantic,
            include_bleu,
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Result<Self, QuizError> {
        Ok(Self::new(create_scorer(&config.embedding)?, config.include_bleu))
    }

    pub fn include_bleu(&self) -> bool {
        self.include_bleu
    }

    /// Score one answer against the gold table.
    pub async fn evaluate(
        &self,
        question_id: &str,
        answer: &ModelAnswer,
        gold: &GoldTable,
    ) -> Result<ScoreRecord, EvaluationError> {
        let reference = gold
            .get(question_id)
            .ok_or_else(|| EvaluationError::UnknownQuestion {
                question_id: question_id.to_string(),
            })?;

        let record = match (reference, answer) {
            (
                GoldAnswer::Mcq {
                    answer: gold_answer,
                    explanation: gold_explanation,
                },
                ModelAnswer::Choice {
                    answer,
                    explanation,
                },
            ) => ScoreRecord::Mcq {
                correct: evaluate_mcq(answer, gold_answer),
                explanation_scores: self.score_text(explanation, gold_explanation).await?,
            },
            (GoldAnswer::ShortAnswer { text: gold_text }, ModelAnswer::Text(text)) => {
                ScoreRecord::ShortAnswer(self.score_text(text, gold_text).await?)
            }
            (GoldAnswer::CaseBased { text: gold_text }, ModelAnswer::Text(text)) => {
                ScoreRecord::CaseBased(SemanticScore {
                    semantic_f1: self.semantic.f1(text, gold_text).await?,
                })
            }
            (reference, _) => {
                return Err(EvaluationError::AnswerShapeMismatch {
                    question_id: question_id.to_string(),
                    expected: reference.kind_name().to_string(),
                });
            }
        };

        debug!(question_id = %question_id, kind = reference.kind_name(), "Answer scored");
        Ok(record)
    }

    /// ROUGE-L, semantic F1 and (when enabled) BLEU. All or nothing.
    pub async fn score_text(
        &self,
        candidate: &str,
        reference: &str,
    ) -> Result<TextScores, EvaluationError> {
        let semantic_f1 = self.semantic.f1(candidate, reference).await?;
        Ok(TextScores {
            rouge_l: rouge_l(candidate, reference),
            bleu: self
                .include_bleu
                .then(|| sentence_bleu(candidate, reference)),
            semantic_f1,
        })
    }
}
