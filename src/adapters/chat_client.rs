//! OpenAI-compatible chat completions client
//!
//! Talks to any `/chat/completions` endpoint (the default is the
//! AcademicCloud gateway). Rate limiting is surfaced as its own error variant
//! so callers can stop a batch instead of burning through failures.

use crate::models::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://chat-ai.academiccloud.de/v1";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("rate limited by model provider (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("transient model error: {0}")]
    Transient(String),

    #[error("model request failed: {0}")]
    Fatal(String),
}

/// Anything that can answer a chat prompt with raw text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, ChatError>;
}

/// Network budgets for slow, large-context model calls.
#[derive(Debug, Clone, Copy)]
pub struct ChatTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub overall: Duration,
}

impl Default for ChatTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            read: Duration::from_secs(200),
            overall: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat endpoints
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: String,
    stream: bool,
}

impl OpenAiCompatClient {
    /// Create a client with the given key and network budgets
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeouts: ChatTimeouts,
    ) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .timeout(timeouts.overall)
            .build()
            .map_err(|e| ChatError::Fatal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            stream: false,
        })
    }

    /// Echo the response to stdout as it is generated
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    async fn send(&self, messages: &[ChatMessage], model: &str) -> Result<reqwest::Response, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model,
            messages,
            stream: self.stream,
        };

        debug!(model = %model, messages = messages.len(), "Sending chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transient(format!("request failed: {}", e)))?;

        check_status(resp).await
    }

    async fn read_stream(&self, resp: reqwest::Response) -> Result<String, ChatError> {
        info!("Streaming response...");

        let mut stream = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut full = String::new();
        let mut finished = false;

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ChatError::Transient(format!("stream interrupted: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line = String::from_utf8_lossy(&buffer[..newline]).to_string();
                buffer.drain(..=newline);

                if handle_event_line(&line, &mut full)? {
                    finished = true;
                    break 'outer;
                }
            }
        }

        // The last event may arrive without a trailing newline
        if !finished && !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).to_string();
            handle_event_line(&line, &mut full)?;
        }

        println!("\n[End of stream]");
        Ok(full)
    }
}

/// Append one SSE line's delta to `full`; true on the end-of-stream marker
fn handle_event_line(line: &str, full: &mut String) -> Result<bool, ChatError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(false);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(true);
    }

    let parsed: StreamChunk =
        serde_json::from_str(data).map_err(|e| ChatError::Fatal(format!("malformed stream chunk: {}", e)))?;
    let piece = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    print!("{}", piece);
    let _ = std::io::stdout().flush();
    full.push_str(&piece);
    Ok(false)
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, ChatError> {
        let resp = self.send(messages, model).await?;

        if self.stream {
            return self.read_stream(resp).await;
        }

        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::Fatal(format!("parse failed: {}", e)))?;

        data.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ChatError::Fatal("response contained no choices".to_string()))
    }
}

/// Map HTTP failures onto the rate-limit / transient / fatal split
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        return Err(ChatError::RateLimited { retry_after_secs });
    }

    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(ChatError::Transient(format!("status: {}: {}", status, body)))
    } else {
        Err(ChatError::Fatal(format!("status: {}: {}", status, body)))
    }
}
