//! Fundamental types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One record returned by the literature backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteratureRecord {
    pub title: String,
    /// Abstract text; `None` when the article has no abstract.
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A retrieved article, ready to be projected into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    content: String,
    title: String,
    keywords: Vec<String>,
}

impl Document {
    pub fn new(
        content: impl Into<String>,
        title: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            content: content.into(),
            title: title.into(),
            keywords,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl From<LiteratureRecord> for Document {
    fn from(record: LiteratureRecord) -> Self {
        Self {
            content: record.abstract_text.unwrap_or_default(),
            title: record.title,
            keywords: record.keywords,
        }
    }
}

/// Which kind of question set the prompt asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionSetKind {
    /// Multiple-choice questions with four labeled options.
    Mcq,
    /// Clinical case scenarios with a single management answer.
    CaseBased,
    /// Short conceptual questions with a concise answer.
    ShortAnswer,
    /// No question section; the model works from the topic alone.
    #[default]
    Freeform,
}

impl QuestionSetKind {
    /// Map the literal topic values the quiz form accepts onto a kind.
    ///
    /// Only exact values select a section; any other topic is freeform.
    pub fn from_topic(topic: &str) -> Self {
        match topic {
            "quiz" => Self::Mcq,
            "case-based" | "case study" => Self::CaseBased,
            "short-answer" => Self::ShortAnswer,
            _ => Self::Freeform,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mcq" | "quiz" | "multiple-choice" => Some(Self::Mcq),
            "case-based" | "case" | "case study" | "case-study" => Some(Self::CaseBased),
            "short-answer" | "short" => Some(Self::ShortAnswer),
            "freeform" | "free" => Some(Self::Freeform),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mcq => write!(f, "mcq"),
            Self::CaseBased => write!(f, "case-based"),
            Self::ShortAnswer => write!(f, "short-answer"),
            Self::Freeform => write!(f, "freeform"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_from_record_without_abstract() {
        let record = LiteratureRecord {
            title: "Oral rehydration in children".into(),
            abstract_text: None,
            keywords: vec![],
        };
        let doc = Document::from(record);
        assert_eq!(doc.content(), "");
        assert_eq!(doc.title(), "Oral rehydration in children");
        assert!(doc.keywords().is_empty());
    }

    #[test]
    fn test_kind_from_topic_literal_values() {
        assert_eq!(QuestionSetKind::from_topic("quiz"), QuestionSetKind::Mcq);
        assert_eq!(
            QuestionSetKind::from_topic("case-based"),
            QuestionSetKind::CaseBased
        );
        assert_eq!(
            QuestionSetKind::from_topic("case study"),
            QuestionSetKind::CaseBased
        );
        assert_eq!(
            QuestionSetKind::from_topic("short-answer"),
            QuestionSetKind::ShortAnswer
        );
        assert_eq!(
            QuestionSetKind::from_topic("Generate a quiz on COVID-19."),
            QuestionSetKind::Freeform
        );
        // Exact match only
        assert_eq!(
            QuestionSetKind::from_topic("Quiz"),
            QuestionSetKind::Freeform
        );
    }

    #[test]
    fn test_kind_display_roundtrips_through_loose_parse() {
        for kind in [
            QuestionSetKind::Mcq,
            QuestionSetKind::CaseBased,
            QuestionSetKind::ShortAnswer,
            QuestionSetKind::Freeform,
        ] {
            let parsed = QuestionSetKind::from_str_loose(&kind.to_string());
            assert_eq!(parsed, Some(kind));
        }
        assert_eq!(QuestionSetKind::from_str_loose("essay"), None);
    }
}
