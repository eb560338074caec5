//! OpenAlex works search
//!
//! OpenAlex ships abstracts as an inverted index (word -> positions), so
//! they are rebuilt before the record is accepted.

use super::{fetch_json, search_http_client, SearchError, SearchProvider};
use crate::models::PaperRecord;
use crate::utils::http::{rate_limiters, RetryConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Largest page OpenAlex will serve
const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    doi: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<Authorship>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: AuthorRef,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

pub struct OpenAlexClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    retry: RetryConfig,
}

impl OpenAlexClient {
    /// `email` opts into the polite pool
    pub fn new(email: Option<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: search_http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            email,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchProvider for OpenAlexClient {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn search(
        &self,
        keyword: &str,
        min_year: i32,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        rate_limiters::OPENALEX.wait_for_slot("openalex").await;

        let mut url = format!(
            "{}/works?search={}&filter=publication_year:>{}&sort=cited_by_count:desc&per_page={}",
            self.base_url,
            urlencoding::encode(keyword),
            min_year - 1,
            max_results.clamp(1, MAX_PER_PAGE)
        );
        if let Some(email) = &self.email {
            url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
        }

        debug!("OpenAlex search: {}", keyword);

        let response: WorksResponse = fetch_json(
            &self.client,
            &url,
            &[],
            &self.retry,
            &format!("OpenAlex search for {}", keyword),
        )
        .await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|work| to_record(work, min_year))
            .collect())
    }
}

fn to_record(work: Work, min_year: i32) -> Option<PaperRecord> {
    let abstract_text = match work.abstract_text {
        Some(text) if text.len() > 5 => text,
        _ => work
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_inverted_abstract)
            .unwrap_or_default(),
    };

    let doi = work.doi.filter(|d| !d.is_empty())?;
    let title = work.title.filter(|t| !t.is_empty())?;
    if abstract_text.is_empty() {
        return None;
    }

    let year = work.publication_year.unwrap_or(0);
    if year < min_year {
        return None;
    }

    Some(PaperRecord {
        title,
        authors: work
            .authorships
            .into_iter()
            .filter_map(|a| a.author.display_name)
            .collect(),
        url: doi.clone(),
        doi,
        r#abstract: abstract_text,
        year,
        source: "openalex".to_string(),
    })
}

/// Rebuild abstract text from an inverted index.
///
/// Positions nobody claims become empty words, matching how gaps appear in
/// the source data.
pub fn reconstruct_inverted_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let Some(max_pos) = index.values().flatten().max().copied() else {
        return String::new();
    };

    let mut words: Vec<&str> = vec![""; max_pos + 1];
    for (word, positions) in index {
        for &pos in positions {
            words[pos] = word.as_str();
        }
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_inverted_abstract() {
        let idx: HashMap<String, Vec<usize>> =
            serde_json::from_str(r#"{"the": [0, 3], "cat": [1], "saw": [2], "dog": [4]}"#).unwrap();
        assert_eq!(reconstruct_inverted_abstract(&idx), "the cat saw the dog");
    }

    #[test]
    fn test_reconstruct_empty_index() {
        assert_eq!(reconstruct_inverted_abstract(&HashMap::new()), "");
    }

    #[tokio::test]
    async fn test_search_maps_works() {
        let body = r#"{"results": [
            {"doi": "https://doi.org/10.1/a", "title": "Inverted", "abstract_inverted_index": {"Hello": [0], "world": [1]},
             "publication_year": 2021, "authorships": [{"author": {"display_name": "B. Writer"}}]},
            {"doi": null, "title": "No DOI", "abstract_inverted_index": {"x": [0]}, "publication_year": 2021},
            {"doi": "https://doi.org/10.1/b", "title": "No Abstract", "abstract_inverted_index": null, "publication_year": 2021}
        ]}"#;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("search".into(), "fake news".into()),
                mockito::Matcher::UrlEncoded("filter".into(), "publication_year:>2019".into()),
                mockito::Matcher::UrlEncoded("mailto".into(), "me@example.org".into()),
            ]))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = OpenAlexClient::new(Some("me@example.org".to_string()))
            .unwrap()
            .with_base_url(server.url());
        let papers = client.search("fake news", 2020, 25).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].r#abstract, "Hello world");
        assert_eq!(papers[0].url, "https://doi.org/10.1/a");
        assert_eq!(papers[0].authors, vec!["B. Writer"]);
    }
}
