//! Result aggregation across models and questions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::answers::{GoldTable, ModelAnswers};
use super::evaluator::{AnswerEvaluator, ScoreRecord};
use crate::error::EvaluationError;

/// Model name → question id → score, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    models: BTreeMap<String, BTreeMap<String, ScoreRecord>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a score. A later record for the same pair replaces the earlier one.
    pub fn record(&mut self, model: &str, question_id: &str, score: ScoreRecord) {
        self.models
            .entry(model.to_string())
            .or_default()
            .insert(question_id.to_string(), score);
    }

    /// Make sure `model` has a row, even if it never gets a score.
    pub fn ensure_model(&mut self, model: &str) {
        self.models.entry(model.to_string()).or_default();
    }

    pub fn get(&self, model: &str, question_id: &str) -> Option<&ScoreRecord> {
        self.models.get(model)?.get(question_id)
    }

    pub fn model(&self, model: &str) -> Option<&BTreeMap<String, ScoreRecord>> {
        self.models.get(model)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, ScoreRecord>)> {
        self.models.iter()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Score every answer of every model, stopping at the first error.
pub async fn evaluate_all(
    evaluator: &AnswerEvaluator,
    answers: &ModelAnswers,
    gold: &GoldTable,
) -> Result<ResultTable, EvaluationError> {
    let mut table = ResultTable::new();

    for (model, responses) in answers {
        table.ensure_model(model);
        for (question_id, answer) in responses {
            let score = evaluator.evaluate(question_id, answer, gold).await?;
            table.record(model, question_id, score);
        }
        info!(model = %model, answers = responses.len(), "Model evaluated");
    }

    Ok(table)
}
