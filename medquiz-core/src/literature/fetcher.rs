//! Turns a topic into documents, one literature search per query line.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::LiteratureSource;
use crate::types::Document;

/// Fetches the top article(s) for each query line of a topic.
///
/// A failing query is logged and skipped; it never aborts the batch.
pub struct ArticleFetcher {
    source: Arc<dyn LiteratureSource>,
    max_results_per_query: usize,
}

impl ArticleFetcher {
    pub fn new(source: Arc<dyn LiteratureSource>, max_results_per_query: usize) -> Self {
        Self {
            source,
            max_results_per_query: max_results_per_query.max(1),
        }
    }

    /// Split a topic into trimmed, non-empty query lines.
    pub fn split_queries(topic: &str) -> Vec<&str> {
        topic
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Fetch documents for every query line of `topic`.
    pub async fn fetch(&self, topic: &str) -> Vec<Document> {
        self.fetch_queries(&Self::split_queries(topic)).await
    }

    /// Fetch documents for an explicit list of queries, in order.
    pub async fn fetch_queries(&self, queries: &[&str]) -> Vec<Document> {
        let mut documents = Vec::new();

        for query in queries {
            match self.source.search(query, self.max_results_per_query).await {
                Ok(records) => {
                    debug!(
                        source = self.source.name(),
                        query = %query,
                        hits = records.len(),
                        "Literature query complete"
                    );
                    documents.extend(
                        records
                            .into_iter()
                            .take(self.max_results_per_query)
                            .map(Document::from),
                    );
                }
                Err(e) => {
                    warn!(
                        source = self.source.name(),
                        query = %query,
                        error = %e,
                        "Literature query failed, skipping"
                    );
                }
            }
        }

        info!(
            queries = queries.len(),
            documents = documents.len(),
            "Fetched literature"
        );
        documents
    }
}
