//! Template context: the topic, the question kind and one entry per article.

use serde::Serialize;

use crate::types::{Document, QuestionSetKind};

/// One article as the prompt template sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleContext {
    pub content: String,
    pub title: String,
    pub keywords: Vec<String>,
}

impl From<&Document> for ArticleContext {
    fn from(doc: &Document) -> Self {
        Self {
            content: doc.content().to_string(),
            title: doc.title().to_string(),
            keywords: doc.keywords().to_vec(),
        }
    }
}

/// Everything the prompt template needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateContext {
    pub topic: String,
    pub kind: QuestionSetKind,
    pub articles: Vec<ArticleContext>,
}

/// Projects fetched documents into a [`TemplateContext`].
pub struct PromptContextBuilder;

impl PromptContextBuilder {
    /// One article entry per document, same order, nothing filtered.
    pub fn build(topic: &str, kind: QuestionSetKind, documents: &[Document]) -> TemplateContext {
        TemplateContext {
            topic: topic.to_string(),
            kind,
            articles: documents.iter().map(ArticleContext::from).collect(),
        }
    }
}
