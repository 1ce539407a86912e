//! Literature retrieval.
//!
//! `LiteratureSource` is the boundary to a search backend (PubMed by default).
//! `ArticleFetcher` drives it over the query lines of a topic and turns the
//! hits into [`Document`](crate::types::Document)s, dropping queries that fail.

pub mod fetcher;
pub mod pubmed;

use crate::error::LiteratureError;
use crate::types::LiteratureRecord;
use async_trait::async_trait;

pub use fetcher::ArticleFetcher;
pub use pubmed::PubMedClient;

/// A literature search backend.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Return up to `max_results` records for `query`, best match first.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<LiteratureRecord>, LiteratureError>;

    /// Backend name used in logs.
    fn name(&self) -> &str;
}
