//! arXiv API client
//!
//! Keyword search over the Atom feed of arXiv's query API.
//! See: https://arxiv.org/help/api/

use super::{fetch_text, search_http_client, SearchError, SearchProvider};
use crate::models::PaperRecord;
use crate::utils::http::{rate_limiters, RetryConfig};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

/// Client for the arXiv API
pub struct ArxivClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl ArxivClient {
    /// Create a new arXiv client
    pub fn new() -> Result<Self, SearchError> {
        Ok(Self {
            client: search_http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_secs(3), // arXiv asks for 3-second delays
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

    /// Extract arXiv ID from a DOI or URL
    ///
    /// Handles formats like:
    /// - 2301.12345
    /// - https://arxiv.org/abs/2301.12345v2
    /// - 10.48550/arXiv.2301.12345 (DOI format)
    /// - hep-th/9901001
    pub fn extract_arxiv_id(input: &str) -> Option<String> {
        // New format: YYMM.NNNNN, old format: category/YYMMNNN
        let new_pattern = Regex::new(r"(\d{4}\.\d{4,5}(?:v\d+)?)").ok()?;
        let old_pattern = Regex::new(r"([a-z-]+/\d{7}(?:v\d+)?)").ok()?;

        if let Some(cap) = new_pattern.captures(input) {
            return Some(cap[1].to_string());
        }

        old_pattern.captures(input).map(|cap| cap[1].to_string())
    }
}

#[async_trait]
impl SearchProvider for ArxivClient {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(
        &self,
        keyword: &str,
        min_year: i32,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        rate_limiters::ARXIV.wait_for_slot("arxiv").await;

        let query = format!("all:{}", keyword);
        let url = format!(
            "{}/api/query?search_query={}&start=0&max_results={}&sortBy=relevance",
            self.base_url,
            urlencoding::encode(&query),
            max_results
        );

        debug!("arXiv search: {}", keyword);

        let feed = fetch_text(
            &self.client,
            &url,
            &[],
            &self.retry,
            &format!("arXiv search for {}", keyword),
        )
        .await?;

        let entries = parse_feed(&feed)?;
        Ok(entries
            .into_iter()
            .filter(|paper| paper.year >= min_year)
            .collect())
    }
}

/// Regexes for the handful of Atom elements we read
struct FeedPatterns {
    entry: Regex,
    id: Regex,
    title: Regex,
    summary: Regex,
    published: Regex,
    author: Regex,
    doi: Regex,
    pdf_link: Regex,
    href: Regex,
}

impl FeedPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            entry: Regex::new(r"(?s)<entry>(.*?)</entry>")?,
            id: Regex::new(r"<id>\s*https?://arxiv\.org/abs/([^<\s]+)\s*</id>")?,
            title: Regex::new(r"(?s)<title[^>]*>(.*?)</title>")?,
            summary: Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>")?,
            published: Regex::new(r"<published>\s*(\d{4})")?,
            author: Regex::new(r"(?s)<author>\s*<name>(.*?)</name>")?,
            doi: Regex::new(r"(?s)<arxiv:doi[^>]*>(.*?)</arxiv:doi>")?,
            pdf_link: Regex::new(r#"<link\s[^>]*title="pdf"[^>]*>"#)?,
            href: Regex::new(r#"href="([^"]+)""#)?,
        })
    }
}

/// Parse an arXiv Atom feed into records.
///
/// Entries without a title or publication year are skipped.
fn parse_feed(xml: &str) -> Result<Vec<PaperRecord>, SearchError> {
    let patterns = FeedPatterns::new().map_err(|e| SearchError::Parse(e.to_string()))?;
    let capture = |re: &Regex, text: &str| -> Option<String> {
        re.captures(text).map(|c| collapse_whitespace(&decode_entities(&c[1])))
    };

    let mut papers = Vec::new();
    for entry in patterns.entry.captures_iter(xml) {
        let entry = &entry[1];

        let Some(title) = capture(&patterns.title, entry).filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some(year) = patterns
            .published
            .captures(entry)
            .and_then(|c| c[1].parse::<i32>().ok())
        else {
            continue;
        };

        let url = patterns
            .pdf_link
            .find(entry)
            .and_then(|tag| patterns.href.captures(tag.as_str()))
            .map(|c| c[1].to_string())
            .or_else(|| {
                patterns
                    .id
                    .captures(entry)
                    .map(|c| format!("https://arxiv.org/pdf/{}", &c[1]))
            })
            .unwrap_or_default();

        papers.push(PaperRecord {
            title,
            authors: patterns
                .author
                .captures_iter(entry)
                .map(|c| collapse_whitespace(&decode_entities(&c[1])))
                .collect(),
            doi: capture(&patterns.doi, entry).unwrap_or_default(),
            r#abstract: capture(&patterns.summary, entry).unwrap_or_default(),
            url,
            year,
            source: "arxiv".to_string(),
        });
    }

    Ok(papers)
}

/// Titles and abstracts in the feed are hard-wrapped
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:narratives</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <published>2023-01-29T10:00:00Z</published>
    <title>Tracking Propaganda
      Narratives &amp; Frames</title>
    <summary>  We track narratives
across platforms.
</summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <author>
      <name>Alan Turing</name>
    </author>
    <arxiv:doi xmlns:arxiv="http://arxiv.org/schemas/atom">10.1000/xyz</arxiv:doi>
    <link href="http://arxiv.org/abs/2301.12345v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.12345v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1801.00001v2</id>
    <published>2018-01-01T00:00:00Z</published>
    <title>An Older Paper</title>
    <summary>Old.</summary>
    <author><name>Someone</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.title, "Tracking Propaganda Narratives & Frames");
        assert_eq!(first.r#abstract, "We track narratives across platforms.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.doi, "10.1000/xyz");
        assert_eq!(first.url, "http://arxiv.org/pdf/2301.12345v1");
        assert_eq!(first.year, 2023);

        // No pdf link or doi: fall back to the id
        let second = &papers[1];
        assert_eq!(second.doi, "");
        assert_eq!(second.url, "https://arxiv.org/pdf/1801.00001v2");
    }

    #[test]
    fn test_feed_title_is_not_an_entry() {
        let papers = parse_feed(FEED).unwrap();
        assert!(papers.iter().all(|p| !p.title.starts_with("ArXiv Query")));
    }

    #[tokio::test]
    async fn test_search_filters_by_year() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "search_query".into(),
                "all:narratives".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let client = ArxivClient::new().unwrap().with_base_url(server.url());
        let papers = client.search("narratives", 2020, 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].source, "arxiv");
    }

    #[test]
    fn test_extract_arxiv_id() {
        assert_eq!(
            ArxivClient::extract_arxiv_id("https://arxiv.org/abs/2301.12345"),
            Some("2301.12345".to_string())
        );
        assert_eq!(
            ArxivClient::extract_arxiv_id("10.48550/arXiv.2301.12345"),
            Some("2301.12345".to_string())
        );
        assert_eq!(
            ArxivClient::extract_arxiv_id("2301.12345v2"),
            Some("2301.12345v2".to_string())
        );
        assert_eq!(
            ArxivClient::extract_arxiv_id("hep-th/9901001"),
            Some("hep-th/9901001".to_string())
        );
        assert_eq!(ArxivClient::extract_arxiv_id("not-an-arxiv-id"), None);
    }
}
