//! Gold and model answer sets.
//!
//! Gold files map question ids to answers. An entry is either explicitly
//! tagged with a `kind`, or in the legacy shape where an object with
//! `answer`/`explanation` is a multiple-choice answer, a string under an id
//! containing `"Case"` is a case-based answer, and any other string is a
//! short answer. The kind is settled here, once, at load time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::EvaluationError;

/// Reference answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoldAnswer {
    Mcq {
        answer: String,
        #[serde(default)]
        explanation: String,
    },
    CaseBased { text: String },
    ShortAnswer { text: String },
}

impl GoldAnswer {
    /// Human-readable kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Mcq { .. } => "multiple-choice",
            Self::CaseBased { .. } => "case-based",
            Self::ShortAnswer { .. } => "short-answer",
        }
    }
}

/// A model's answer, in whatever shape it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelAnswer {
    Choice {
        answer: String,
        #[serde(default)]
        explanation: String,
    },
    Text(String),
}

/// Model name → question id → answer.
pub type ModelAnswers = BTreeMap<String, BTreeMap<String, ModelAnswer>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGoldEntry {
    Tagged(GoldAnswer),
    Choice {
        answer: String,
        #[serde(default)]
        explanation: String,
    },
    Text(String),
}

impl RawGoldEntry {
    fn classify(self, question_id: &str) -> GoldAnswer {
        match self {
            Self::Tagged(gold) => gold,
            Self::Choice {
                answer,
                explanation,
            } => GoldAnswer::Mcq {
                answer,
                explanation,
            },
            Self::Text(text) if question_id.contains("Case") => GoldAnswer::CaseBased { text },
            Self::Text(text) => GoldAnswer::ShortAnswer { text },
        }
    }
}

/// Gold answers keyed by question id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldTable {
    entries: BTreeMap<String, GoldAnswer>,
}

impl GoldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question_id: impl Into<String>, gold: GoldAnswer) {
        self.entries.insert(question_id.into(), gold);
    }

    pub fn get(&self, question_id: &str) -> Option<&GoldAnswer> {
        self.entries.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GoldAnswer)> {
        self.entries.iter()
    }

    /// Parse a gold JSON object, classifying legacy entries.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, RawGoldEntry> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(qid, entry)| {
                let gold = entry.classify(&qid);
                (qid, gold)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, EvaluationError> {
        let text = read_file(path)?;
        Self::from_json_str(&text).map_err(|e| load_error(path, e))
    }
}

impl FromIterator<(String, GoldAnswer)> for GoldTable {
    fn from_iter<I: IntoIterator<Item = (String, GoldAnswer)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Parse `{ model: { question_id: answer } }`.
pub fn parse_model_answers(json: &str) -> Result<ModelAnswers, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn load_model_answers(path: &Path) -> Result<ModelAnswers, EvaluationError> {
    let text = read_file(path)?;
    parse_model_answers(&text).map_err(|e| load_error(path, e))
}

fn read_file(path: &Path) -> Result<String, EvaluationError> {
    std::fs::read_to_string(path).map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, err: impl std::fmt::Display) -> EvaluationError {
    EvaluationError::Load {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
