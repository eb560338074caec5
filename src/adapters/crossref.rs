//! Crossref works search
//!
//! Only works with deposited full-text links are requested. Abstracts come
//! as JATS XML; the first `<jats:p>` body is used.

use super::{fetch_json, search_http_client, SearchError, SearchProvider};
use crate::models::PaperRecord;
use crate::utils::http::{rate_limiters, RetryConfig};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// Crossref caps `rows` at 1000
const MAX_ROWS: usize = 1000;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    issued: Option<DateParts>,
    #[serde(default)]
    link: Vec<Link>,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(rename = "DOI", default)]
    doi: String,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    given: Option<String>,
    family: Option<String>,
}

impl Author {
    fn full_name(&self) -> String {
        [self.given.as_deref(), self.family.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct CrossrefClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    retry: RetryConfig,
}

impl CrossrefClient {
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
impl SearchProvider for CrossrefClient {
    fn name(&self) -> &'static str {
        "crossref"
    }

    async fn search(
        &self,
        keyword: &str,
        min_year: i32,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        rate_limiters::CROSSREF.wait_for_slot("crossref").await;

        let mut url = format!(
            "{}/works?query.bibliographic={}&filter=has-full-text:true&rows={}",
            self.base_url,
            urlencoding::encode(keyword),
            max_results.clamp(1, MAX_ROWS)
        );
        if let Some(email) = &self.email {
            url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
        }

        debug!("Crossref search: {}", keyword);

        let response: WorksResponse = fetch_json(
            &self.client,
            &url,
            &[],
            &self.retry,
            &format!("Crossref search for {}", keyword),
        )
        .await?;

        let paragraph =
            Regex::new(r"(?s)<jats:p>(.*?)</jats:p>").map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(response
            .message
            .items
            .into_iter()
            .filter_map(|item| to_record(item, min_year, &paragraph))
            .collect())
    }
}

/// Keep items with an issue year at or above the floor plus a title,
/// abstract paragraph and link
fn to_record(item: Item, min_year: i32, paragraph: &Regex) -> Option<PaperRecord> {
    let year = item
        .issued
        .as_ref()
        .and_then(|issued| issued.date_parts.first())
        .and_then(|parts| parts.first().copied().flatten())?;
    if year < min_year {
        return None;
    }

    let title = item.title.into_iter().next().filter(|t| !t.is_empty())?;
    let abstract_text = item
        .abstract_text
        .as_deref()
        .and_then(|raw| paragraph.captures(raw))
        .map(|c| c[1].trim().to_string())
        .filter(|a| !a.is_empty())?;
    let url = item
        .link
        .into_iter()
        .next()
        .and_then(|link| link.url)
        .filter(|u| !u.is_empty())?;

    Some(PaperRecord {
        title,
        authors: item.author.iter().map(Author::full_name).collect(),
        doi: item.doi,
        r#abstract: abstract_text,
        url,
        year,
        source: "crossref".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"status": "ok", "message": {"items": [
        {"title": ["Conspiracy Narratives Online"], "DOI": "10.5/c1",
         "abstract": "<jats:title>Abstract</jats:title><jats:p>\n  Conspiracy theories spread.\n</jats:p><jats:p>Second.</jats:p>",
         "issued": {"date-parts": [[2022, 5, 1]]},
         "link": [{"URL": "https://example.org/c1.pdf", "content-type": "application/pdf"}],
         "author": [{"given": "Grace", "family": "Hopper"}, {"family": "Solo"}]},
        {"title": ["Undated"], "DOI": "10.5/c2", "abstract": "<jats:p>Text</jats:p>",
         "issued": {"date-parts": [[null]]}, "link": [{"URL": "https://example.org/c2"}]},
        {"title": ["No Abstract"], "DOI": "10.5/c3",
         "issued": {"date-parts": [[2022]]}, "link": [{"URL": "https://example.org/c3"}]},
        {"title": ["No Link"], "DOI": "10.5/c4", "abstract": "<jats:p>Text</jats:p>",
         "issued": {"date-parts": [[2022]]}, "link": []}
    ]}}"#;

    #[tokio::test]
    async fn test_search_applies_completeness_rules() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query.bibliographic".into(), "conspiracy".into()),
                mockito::Matcher::UrlEncoded("filter".into(), "has-full-text:true".into()),
                mockito::Matcher::UrlEncoded("rows".into(), "20".into()),
            ]))
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = CrossrefClient::new(None).unwrap().with_base_url(server.url());
        let papers = client.search("conspiracy", 2015, 20).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);

        let paper = &papers[0];
        assert_eq!(paper.title, "Conspiracy Narratives Online");
        assert_eq!(paper.r#abstract, "Conspiracy theories spread.");
        assert_eq!(paper.url, "https://example.org/c1.pdf");
        assert_eq!(paper.authors, vec!["Grace Hopper", "Solo"]);
        assert_eq!(paper.year, 2022);
        assert_eq!(paper.doi, "10.5/c1");
    }

    #[tokio::test]
    async fn test_year_floor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = CrossrefClient::new(None).unwrap().with_base_url(server.url());
        let papers = client.search("conspiracy", 2023, 20).await.unwrap();
        assert!(papers.is_empty());
    }
}
