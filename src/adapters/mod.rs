//! External service adapters
//!
//! This module contains adapters for external services and APIs:
//! - Semantic Scholar, arXiv, OpenAlex, Crossref: keyword search providers
//! - Chat client: OpenAI-compatible model endpoint used for annotation
//! - PDF scraper: full-text download and extraction

pub mod arxiv;
pub mod chat_client;
pub mod crossref;
pub mod openalex;
pub mod pdf_scraper;
pub mod semantic_scholar;

use crate::models::PaperRecord;
use crate::utils::http::{with_retry, RetryConfig, USER_AGENT};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// Re-export commonly used types
pub use arxiv::ArxivClient;
pub use chat_client::{ChatError, ChatModel, ChatTimeouts, OpenAiCompatClient};
pub use crossref::CrossrefClient;
pub use openalex::OpenAlexClient;
pub use semantic_scholar::SemanticScholarClient;

/// Default timeout for search API requests
const SEARCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("status: {status} from {url}")]
    Status { status: u16, url: String },

    #[error("parse failed: {0}")]
    Parse(String),
}

impl SearchError {
    /// Network errors, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Request(_) => true,
            SearchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A keyword search against one bibliographic source.
///
/// Implementations apply their own completeness rules (required fields,
/// year floor) and return normalised records. Relevance filtering and
/// deduplication happen downstream.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Identifier written to each record's `source`
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        keyword: &str,
        min_year: i32,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SearchError>;
}

/// Providers that can be enabled from settings or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    SemanticScholar,
    Arxiv,
    OpenAlex,
    Crossref,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::SemanticScholar,
        ProviderKind::Arxiv,
        ProviderKind::OpenAlex,
        ProviderKind::Crossref,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::SemanticScholar => "semantic_scholar",
            ProviderKind::Arxiv => "arxiv",
            ProviderKind::OpenAlex => "open_alex",
            ProviderKind::Crossref => "crossref",
        }
    }

    /// Build the provider client
    pub fn build(self, options: &ProviderOptions) -> Result<Box<dyn SearchProvider>, SearchError> {
        Ok(match self {
            ProviderKind::SemanticScholar => Box::new(SemanticScholarClient::new(
                options.semantic_scholar_key.clone(),
            )?),
            ProviderKind::Arxiv => Box::new(ArxivClient::new()?),
            ProviderKind::OpenAlex => Box::new(OpenAlexClient::new(options.contact_email.clone())?),
            ProviderKind::Crossref => Box::new(CrossrefClient::new(options.contact_email.clone())?),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "semantic_scholar" | "semanticscholar" => Ok(ProviderKind::SemanticScholar),
            "arxiv" => Ok(ProviderKind::Arxiv),
            "open_alex" | "openalex" => Ok(ProviderKind::OpenAlex),
            "crossref" => Ok(ProviderKind::Crossref),
            other => Err(format!(
                "unknown provider `{}` (expected one of: semantic_scholar, arxiv, openalex, crossref)",
                other
            )),
        }
    }
}

/// Credentials and contact details shared by provider constructors
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub semantic_scholar_key: Option<String>,
    /// Sent to OpenAlex and Crossref for their polite pools
    pub contact_email: Option<String>,
}

/// HTTP client with the search timeout and user agent applied
pub(crate) fn search_http_client() -> Result<Client, SearchError> {
    Client::builder()
        .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SearchError::Client(e.to_string()))
}

/// GET `url` and return the body text, retrying transient failures
pub(crate) async fn fetch_text(
    client: &Client,
    url: &str,
    headers: &[(&'static str, String)],
    config: &RetryConfig,
    operation_name: &str,
) -> Result<String, SearchError> {
    with_retry(
        config,
        operation_name,
        || async move {
            let mut req = client.get(url);
            for (name, value) in headers {
                req = req.header(*name, value);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| SearchError::Request(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(SearchError::Status {
                    status: resp.status().as_u16(),
                    url: url.to_string(),
                });
            }

            resp.text()
                .await
                .map_err(|e| SearchError::Request(e.to_string()))
        },
        SearchError::is_retryable,
    )
    .await
}

/// GET `url` and decode the JSON body
pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    headers: &[(&'static str, String)],
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, SearchError> {
    let body = fetch_text(client, url, headers, config, operation_name).await?;
    serde_json::from_str(&body).map_err(|e| SearchError::Parse(e.to_string()))
}
