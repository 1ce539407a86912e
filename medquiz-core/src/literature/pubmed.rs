//! PubMed client over the NCBI E-utilities (esearch + efetch) and a
//! lightweight parser for the `PubmedArticleSet` XML it returns.

use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::LiteratureSource;
use crate::config::LiteratureConfig;
use crate::error::LiteratureError;
use crate::types::LiteratureRecord;

const USER_AGENT: &str = concat!("medquiz/", env!("CARGO_PKG_VERSION"));

/// NCBI allows 3 requests/s without a key and 10/s with one.
const MIN_INTERVAL_NO_KEY: Duration = Duration::from_millis(340);
const MIN_INTERVAL_WITH_KEY: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// HTTP client for PubMed.
pub struct PubMedClient {
    client: reqwest::Client,
    base_url: String,
    tool: String,
    email: String,
    api_key: Option<String>,
    last_request: Mutex<Option<Instant>>,
}

impl PubMedClient {
    /// Build a client. The API key is optional and passed in explicitly.
    pub fn new(
        config: &LiteratureConfig,
        api_key: Option<String>,
    ) -> Result<Self, LiteratureError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LiteratureError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tool: config.tool.clone(),
            email: config.email.clone(),
            api_key,
            last_request: Mutex::new(None),
        })
    }

    /// Space requests out to stay under the NCBI rate limit.
    async fn rate_limit(&self) {
        let min_interval = if self.api_key.is_some() {
            MIN_INTERVAL_WITH_KEY
        } else {
            MIN_INTERVAL_NO_KEY
        };
        let mut last = self.last_request.lock().await;
        if let Some(instant) = *last {
            let elapsed = instant.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn common_params(&self) -> String {
        let mut params = format!(
            "tool={}&email={}",
            urlencoding::encode(&self.tool),
            urlencoding::encode(&self.email)
        );
        if let Some(ref key) = self.api_key {
            params.push_str("&api_key=");
            params.push_str(&urlencoding::encode(key));
        }
        params
    }

    /// Build the esearch URL for a query.
    pub fn build_esearch_url(&self, query: &str, max_results: usize) -> String {
        format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retmode=json&{}",
            self.base_url,
            urlencoding::encode(query),
            max_results,
            self.common_params()
        )
    }

    /// Build the efetch URL for a list of PubMed ids.
    pub fn build_efetch_url(&self, ids: &[String]) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml&{}",
            self.base_url,
            ids.join(","),
            self.common_params()
        )
    }

    async fn get_text(&self, url: &str) -> Result<String, LiteratureError> {
        self.rate_limit().await;
        debug!(url = %url, "PubMed request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LiteratureError::Request {
                message: format!("PubMed request failed: {}", e),
            })?;

        check_status(response.status())?;
        response.text().await.map_err(|e| LiteratureError::Request {
            message: format!("Failed to read PubMed response: {}", e),
        })
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), LiteratureError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(LiteratureError::Status {
            status: status.as_u16(),
        })
    }
}

fn parse_esearch_ids(body: &str) -> Result<Vec<String>, LiteratureError> {
    serde_json::from_str::<ESearchResponse>(body)
        .map(|parsed| parsed.esearchresult.idlist)
        .map_err(|e| LiteratureError::ResponseParse {
            message: format!("Invalid esearch JSON: {}", e),
        })
}

/// Turn an esearch reply into records, calling `fetch_articles` with the id
/// list to get the efetch XML. No ids means no efetch call.
async fn records_from_search<F, Fut>(
    esearch_body: &str,
    max_results: usize,
    fetch_articles: F,
) -> Result<Vec<LiteratureRecord>, LiteratureError>
where
    F: FnOnce(Vec<String>) -> Fut,
    Fut: Future<Output = Result<String, LiteratureError>>,
{
    let ids = parse_esearch_ids(esearch_body)?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let xml = fetch_articles(ids).await?;
    let mut records = parse_article_set(&xml);
    records.truncate(max_results);
    Ok(records)
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<LiteratureRecord>, LiteratureError> {
        let url = self.build_esearch_url(query, max_results);
        let body = self.get_text(&url).await?;
        let records = records_from_search(&body, max_results, move |ids| async move {
            let url = self.build_efetch_url(&ids);
            self.get_text(&url).await
        })
        .await?;

        debug!(query = %query, records = records.len(), "PubMed search finished");
        Ok(records)
    }

    fn name(&self) -> &str {
        "pubmed"
    }
}

// ── XML Parsing ───────────────────────────────────────────────

/// Parse a `PubmedArticleSet` document into records, in document order.
pub fn parse_article_set(xml: &str) -> Vec<LiteratureRecord> {
    element_blocks(xml, "PubmedArticle")
        .into_iter()
        .filter_map(|(_, inner)| parse_article(inner))
        .collect()
}

/// Parse one `<PubmedArticle>` body. Articles without a title are skipped.
fn parse_article(article: &str) -> Option<LiteratureRecord> {
    let title = element_blocks(article, "ArticleTitle")
        .first()
        .map(|(_, inner)| clean_text(inner))
        .filter(|t| !t.is_empty())?;

    let sections: Vec<String> = element_blocks(article, "AbstractText")
        .into_iter()
        .filter_map(|(attrs, inner)| {
            let text = clean_text(inner);
            if text.is_empty() {
                return None;
            }
            Some(match extract_attribute(attrs, "Label") {
                Some(label) if !label.is_empty() => format!("{}: {}", label, text),
                _ => text,
            })
        })
        .collect();
    let abstract_text = if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n"))
    };

    let keywords = element_blocks(article, "Keyword")
        .into_iter()
        .map(|(_, inner)| clean_text(inner))
        .filter(|k| !k.is_empty())
        .collect();

    Some(LiteratureRecord {
        title,
        abstract_text,
        keywords,
    })
}

/// Collect `(attributes, inner_xml)` for every `<tag ...>...</tag>` element.
///
/// The tag name must be followed by `>`, `/` or whitespace, so `Abstract`
/// does not match `AbstractText`. Self-closing elements yield an empty body.
fn element_blocks<'a>(xml: &'a str, tag: &str) -> Vec<(&'a str, &'a str)> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find(&open) {
        let start = search_from + pos;
        let after_name = start + open.len();
        let boundary = xml[after_name..].chars().next();
        if !matches!(boundary, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            search_from = after_name;
            continue;
        }

        let Some(tag_end_rel) = xml[after_name..].find('>') else {
            break;
        };
        let tag_end = after_name + tag_end_rel;
        let attrs = &xml[after_name..tag_end];

        if attrs.ends_with('/') {
            blocks.push((attrs.trim_end_matches('/'), ""));
            search_from = tag_end + 1;
            continue;
        }

        let content_start = tag_end + 1;
        let Some(close_rel) = xml[content_start..].find(&close) else {
            break;
        };
        let content_end = content_start + close_rel;
        blocks.push((attrs, &xml[content_start..content_end]));
        search_from = content_end + close.len();
    }

    blocks
}

/// Extract an attribute value from the attribute section of a tag.
pub fn extract_attribute(attrs: &str, attr: &str) -> Option<String> {
    let search = format!("{}=\"", attr);
    let mut from = 0;
    while let Some(pos) = attrs[from..].find(&search) {
        let start = from + pos;
        // Reject suffix matches such as `NlmLabel=` when looking for `Label=`
        let preceded_ok = attrs[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace());
        let value_start = start + search.len();
        if preceded_ok {
            let end = attrs[value_start..].find('"')? + value_start;
            return Some(decode_entities(&attrs[value_start..end]));
        }
        from = value_start;
    }
    None
}

/// Strip inline markup, decode entities, and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    normalize_whitespace(&decode_entities(&strip_tags(raw)))
}

/// Remove every `<...>` span, keeping the text between them.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Decode the predefined XML entities and numeric character references.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Normalize whitespace: collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
