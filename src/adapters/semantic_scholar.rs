//! Semantic Scholar API client
//!
//! Keyword search over the Graph API.
//! See: https://api.semanticscholar.org/

use super::{fetch_json, search_http_client, SearchError, SearchProvider};
use crate::models::PaperRecord;
use crate::utils::http::{rate_limiters, RetryConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

/// The search endpoint returns at most 100 papers per page
const PAGE_SIZE: usize = 100;

const FIELDS: &str = "title,authors,abstract,year,externalIds";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<PaperResponse>,
    next: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PaperResponse {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

/// Client for the Semantic Scholar API
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl SemanticScholarClient {
    /// `api_key` raises the shared anonymous rate limit
    pub fn new(api_key: Option<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: search_http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(30),
                multiplier: 2.0,
            },
        })
    }

    /// Point the client at another host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|key| ("x-api-key", key.clone()))
            .collect()
    }

    async fn fetch_page(
        &self,
        keyword: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResponse, SearchError> {
        rate_limiters::SEMANTIC_SCHOLAR
            .wait_for_slot("semantic_scholar")
            .await;

        let url = format!(
            "{}/graph/v1/paper/search?query={}&fields={}&offset={}&limit={}",
            self.base_url,
            urlencoding::encode(keyword),
            FIELDS,
            offset,
            limit
        );

        debug!("Semantic Scholar search: {} (offset {})", keyword, offset);

        fetch_json(
            &self.client,
            &url,
            &self.headers(),
            &self.retry,
            &format!("Semantic Scholar search for {}", keyword),
        )
        .await
    }
}

#[async_trait]
impl SearchProvider for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semanticscholar"
    }

    async fn search(
        &self,
        keyword: &str,
        min_year: i32,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        let mut papers = Vec::new();
        let mut offset = 0;

        while offset < max_results {
            let limit = PAGE_SIZE.min(max_results - offset);
            let page = self.fetch_page(keyword, offset, limit).await?;
            let fetched = page.data.len();

            papers.extend(
                page.data
                    .into_iter()
                    .filter_map(|paper| to_record(paper, min_year)),
            );

            match page.next {
                Some(next) if fetched > 0 && next > offset => offset = next,
                _ => break,
            }
        }

        Ok(papers)
    }
}

/// Keep papers with a title, abstract, DOI and a year at or above the floor
fn to_record(paper: PaperResponse, min_year: i32) -> Option<PaperRecord> {
    let title = paper.title.filter(|t| !t.is_empty())?;
    let abstract_text = paper.abstract_text.filter(|a| !a.is_empty())?;
    let doi = paper
        .external_ids
        .and_then(|ids| ids.doi)
        .filter(|d| !d.is_empty())?;
    let year = paper.year.filter(|&y| y != 0 && y >= min_year)?;

    Some(PaperRecord {
        title,
        authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
        url: format!("https://doi.org/{}", doi),
        doi,
        r#abstract: abstract_text,
        year,
        source: "semanticscholar".to_string(),
    })
}
