//! HTTP utilities with retry logic and rate limiting
//!
//! Provides exponential backoff, per-provider rate limiting, and PDF
//! validation for downloaded documents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// PDF magic bytes: "%PDF-"
const PDF_MAGIC: &[u8] = b"%PDF-";

/// User agent sent to bibliographic APIs
pub const USER_AGENT: &str = concat!(
    "litsift/",
    env!("CARGO_PKG_VERSION"),
    " (literature review tooling)"
);

/// Sliding-window rate limiter keyed by endpoint
pub struct RateLimiter {
    /// Window size
    window: Duration,
    /// Maximum requests per window
    max_requests: u32,
    /// Request timestamps per endpoint
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if a request can be made and record it
    pub async fn check_and_record(&self, endpoint: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        let timestamps = requests.entry(endpoint.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests as usize {
            debug!(
                "Rate limit hit for {}: {} requests in {:?}",
                endpoint,
                timestamps.len(),
                self.window
            );
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Wait until a request can be made
    pub async fn wait_for_slot(&self, endpoint: &str) {
        while !self.check_and_record(endpoint).await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier (exponential factor)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff duration before retry number `attempt` (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }
}

/// Execute an async operation with exponential backoff retry
///
/// `should_retry` decides whether a given error is worth another attempt.
/// The last error is returned once retries are exhausted.
pub async fn with_retry<T, E, F, Fut, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                let backoff = config.backoff_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}): {}. Retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether bytes start with the PDF magic header
pub fn is_valid_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Check if a response looks like an HTML login or paywall page
pub fn is_likely_login_page(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if let Some(ct) = content_type {
        if ct.contains("text/html") {
            return true;
        }
    }

    if bytes.len() >= 15 {
        let start = String::from_utf8_lossy(&bytes[..64.min(bytes.len())]).to_lowercase();
        if start.contains("<!doctype") || start.contains("<html") {
            return true;
        }
    }

    false
}

/// Rate limiters for the bibliographic APIs
pub mod rate_limiters {
    use super::RateLimiter;
    use once_cell::sync::Lazy;
    use std::time::Duration;

    /// Semantic Scholar: one request per second
    pub static SEMANTIC_SCHOLAR: Lazy<RateLimiter> =
        Lazy::new(|| RateLimiter::new(Duration::from_secs(1), 1));

    /// arXiv asks for 3 seconds between requests
    pub static ARXIV: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(Duration::from_secs(3), 1));

    /// OpenAlex polite pool: 10 requests per second
    pub static OPENALEX: Lazy<RateLimiter> =
        Lazy::new(|| RateLimiter::new(Duration::from_secs(1), 10));

    /// Crossref polite pool
    pub static CROSSREF: Lazy<RateLimiter> =
        Lazy::new(|| RateLimiter::new(Duration::from_secs(1), 10));
}
