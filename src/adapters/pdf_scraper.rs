//! Full-text retrieval for papers
//!
//! Fetches a paper's PDF (from disk or over HTTP) and extracts its text into
//! the markdown column of the result table.

use super::arxiv::ArxivClient;
use crate::models::{Row, RowStore, MARKDOWN_COLUMN};
use crate::utils::http::{is_likely_login_page, is_valid_pdf, USER_AGENT};
use indicatif::ProgressBar;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default timeout for PDF downloads
const DOWNLOAD_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("row has no url")]
    MissingUrl,

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP status: {0}")]
    Status(u16),

    #[error("no PDF content found (content type `{0}`)")]
    NotPdf(String),

    #[error("response appears to be a login/paywall page")]
    LoginPage,

    #[error("failed to extract PDF text: {0}")]
    Extract(String),
}

/// Counts from a table scrape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeSummary {
    pub scraped: usize,
    pub kept: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct PdfScraper {
    client: Client,
    column: String,
    max_chars: Option<usize>,
}

impl PdfScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            column: MARKDOWN_COLUMN.to_string(),
            max_chars: None,
        })
    }

    /// Store text in `column` instead of the default markdown column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Truncate extracted text to fit a model's context
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Text of the paper behind `row`'s url.
    ///
    /// With `do_not_overwrite`, existing non-empty text is returned as is.
    /// Failures are logged and yield an empty string.
    pub async fn scrape_paper(&self, row: &Row, do_not_overwrite: bool) -> String {
        if do_not_overwrite {
            if let Some(existing) = row.get_str(&self.column).filter(|md| !md.trim().is_empty()) {
                return existing.to_string();
            }
        }

        let url = row.get_str("url").unwrap_or_default().trim();
        match self.fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to retrieve: {}\nError: {}", url, e);
                String::new()
            }
        }
    }

    /// Fill the markdown column for rows `[start, end)`
    pub async fn scrape_table<S>(
        &self,
        rows: &mut S,
        start: usize,
        end: Option<usize>,
        do_not_overwrite: bool,
        progress: Option<&ProgressBar>,
    ) -> ScrapeSummary
    where
        S: RowStore + ?Sized,
    {
        let end = end.map_or(rows.len(), |e| e.min(rows.len()));
        let mut summary = ScrapeSummary::default();

        if let Some(bar) = progress {
            bar.set_length(end.saturating_sub(start) as u64);
        }

        for i in start..end {
            if let Some(bar) = progress {
                bar.inc(1);
            }
            let Some(row) = rows.row(i) else {
                break;
            };

            let had_text = row
                .get_str(&self.column)
                .is_some_and(|md| !md.trim().is_empty());
            if do_not_overwrite && had_text {
                summary.kept += 1;
                continue;
            }

            let text = self.scrape_paper(row, do_not_overwrite).await;
            if text.is_empty() {
                summary.failed += 1;
            } else {
                summary.scraped += 1;
            }
            rows.set(i, &self.column, Value::String(text));
        }

        if let Some(bar) = progress {
            bar.finish();
        }

        info!(
            scraped = summary.scraped,
            kept = summary.kept,
            failed = summary.failed,
            "Scraped papers {}..{}",
            start,
            end
        );
        summary
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        if url.is_empty() {
            return Err(ScrapeError::MissingUrl);
        }

        let text = match local_path(url) {
            Some(path) => extract_file(path).await?,
            None => {
                let bytes = self.download(&pdf_url(url)).await?;
                extract_bytes(bytes).await?
            }
        };

        Ok(self.clean(text))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        debug!("Downloading PDF from {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ScrapeError::Status(resp.status().as_u16()));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ScrapeError::Request(format!("Failed to read response: {}", e)))?;

        if is_likely_login_page(Some(&content_type), &bytes) {
            return Err(ScrapeError::LoginPage);
        }
        if !content_type.to_lowercase().contains("pdf") || !is_valid_pdf(&bytes) {
            return Err(ScrapeError::NotPdf(content_type));
        }

        Ok(bytes.to_vec())
    }

    /// Drop blank lines and apply the length cap
    fn clean(&self, text: String) -> String {
        let cleaned = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        match self.max_chars {
            Some(max) => match cleaned.char_indices().nth(max) {
                Some((cut, _)) => {
                    debug!("Truncating PDF text to {} chars", max);
                    cleaned[..cut].to_string()
                }
                None => cleaned,
            },
            None => cleaned,
        }
    }
}

/// `file://` URLs and paths that exist on disk are read locally
fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    let path = Path::new(url);
    path.is_file().then(|| path.to_path_buf())
}

/// arXiv abstract pages point at the PDF instead
fn pdf_url(url: &str) -> String {
    if url.contains("arxiv.org/abs/") {
        if let Some(id) = ArxivClient::extract_arxiv_id(url) {
            return format!("https://arxiv.org/pdf/{}", id);
        }
    }
    url.to_string()
}

async fn extract_file(path: PathBuf) -> Result<String, ScrapeError> {
    if !path.exists() {
        return Err(ScrapeError::FileNotFound(path));
    }
    debug!("Extracting text from: {:?}", path);

    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| ScrapeError::Extract(e.to_string()))?
        .map_err(|e| ScrapeError::Extract(e.to_string()))
}

async fn extract_bytes(bytes: Vec<u8>) -> Result<String, ScrapeError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ScrapeError::Extract(e.to_string()))?
        .map_err(|e| ScrapeError::Extract(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperRecord, ResultTable};

    fn row_with_url(url: &str) -> Row {
        let mut row = Row::default();
        row.set("title", "Paper");
        row.set("url", url);
        row
    }

    #[tokio::test]
    async fn test_existing_markdown_is_kept() {
        let mut row = row_with_url("https://example.invalid/paper.pdf");
        row.set(MARKDOWN_COLUMN, "# Already here");

        let scraper = PdfScraper::new().unwrap();
        assert_eq!(scraper.scrape_paper(&row, true).await, "# Already here");
    }

    #[tokio::test]
    async fn test_missing_local_file_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        let row = row_with_url(&format!("file://{}", missing.display()));

        let scraper = PdfScraper::new().unwrap();
        assert_eq!(scraper.scrape_paper(&row, true).await, "");
    }

    #[tokio::test]
    async fn test_html_response_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<!DOCTYPE html><html><body>Sign in</body></html>")
            .create_async()
            .await;

        let scraper = PdfScraper::new().unwrap();
        let err = scraper
            .fetch_text(&format!("{}/paper", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::LoginPage));
    }

    #[tokio::test]
    async fn test_non_pdf_content_type_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("%PDF-1.4 not really")
            .create_async()
            .await;

        let scraper = PdfScraper::new().unwrap();
        let err = scraper
            .fetch_text(&format!("{}/paper", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::NotPdf(_)));
    }

    #[tokio::test]
    async fn test_scrape_table_counts_outcomes() {
        let mut table = ResultTable::from_papers(vec![
            PaperRecord::new("Has text", "x"),
            PaperRecord::new("No url", "x"),
        ]);
        table.set(0, MARKDOWN_COLUMN, Value::String("body".to_string()));

        let scraper = PdfScraper::new().unwrap();
        let summary = scraper.scrape_table(&mut table, 0, None, true, None).await;

        assert_eq!(summary, ScrapeSummary { scraped: 0, kept: 1, failed: 1 });
        assert_eq!(table.get(1, MARKDOWN_COLUMN), Some(&Value::String(String::new())));
    }

    #[tokio::test]
    async fn test_clean_drops_blank_lines_and_truncates_on_char_boundary() {
        let scraper = PdfScraper::new().unwrap().with_max_chars(Some(4));
        assert_eq!(scraper.clean("ab\n\n  \nçd\nef".to_string()), "ab\nç");
    }

    #[test]
    fn test_arxiv_abstract_links_point_at_pdf() {
        assert_eq!(
            pdf_url("https://arxiv.org/abs/2301.12345v1"),
            "https://arxiv.org/pdf/2301.12345v1"
        );
        assert_eq!(pdf_url("https://example.org/a.pdf"), "https://example.org/a.pdf");
    }
}
