//! Keyword search across providers
//!
//! Each provider is queried once per keyword, sequentially. A failing keyword
//! is logged and skipped; the rest of the provider's results still reach the
//! aggregation session.

use super::aggregator::{AggregationSession, IngestSummary};
use super::relevance::TermGroups;
use crate::adapters::SearchProvider;
use crate::models::PaperRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What to search for and how to filter it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub relevance_terms: TermGroups,
    #[serde(default)]
    pub min_year: i32,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    100
}

impl SearchQuery {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            relevance_terms: TermGroups::default(),
            min_year: 0,
            max_results: default_max_results(),
        }
    }

    fn keep(&self, paper: &PaperRecord) -> bool {
        self.relevance_terms.is_empty() || self.relevance_terms.matches(&paper.title, &paper.r#abstract)
    }
}

/// Outcome of running one provider over every keyword
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReport {
    pub provider: &'static str,
    /// Records that passed the provider's rules and the relevance filter
    pub candidates: usize,
    pub failed_keywords: Vec<String>,
    pub ingest: IngestSummary,
}

/// Search every keyword on `provider` and ingest the relevant results.
pub async fn run_provider(
    provider: &dyn SearchProvider,
    query: &SearchQuery,
    session: &mut AggregationSession,
) -> ProviderReport {
    let name = provider.name();
    info!("Searching {} for {} keywords...", name, query.keywords.len());

    let mut batch = Vec::new();
    let mut failed_keywords = Vec::new();

    for keyword in &query.keywords {
        match provider
            .search(keyword, query.min_year, query.max_results)
            .await
        {
            Ok(papers) => batch.extend(papers.into_iter().filter(|p| query.keep(p))),
            Err(e) => {
                warn!("Error searching '{}' on {}: {}", keyword, name, e);
                failed_keywords.push(keyword.clone());
            }
        }
    }

    let candidates = batch.len();
    info!("Found {} candidate papers on {}", candidates, name);

    let ingest = session.ingest(batch);
    ProviderReport {
        provider: name,
        candidates,
        failed_keywords,
        ingest,
    }
}

/// Run each provider in order against the same session
pub async fn run_all(
    providers: &[Box<dyn SearchProvider>],
    query: &SearchQuery,
    session: &mut AggregationSession,
) -> Vec<ProviderReport> {
    let mut reports = Vec::with_capacity(providers.len());
    for provider in providers {
        reports.push(run_provider(provider.as_ref(), query, session).await);
    }

    info!(
        "Search finished: {} papers from {} providers",
        session.results().len(),
        providers.len()
    );
    reports
}
