//! Extraction of fenced JSON from raw model output
//!
//! Reasoning models may emit free-form thinking before their answer, closed
//! by `</think>`. The answer itself is expected inside a ```` ```json ````
//! fence.

use serde_json::Value;
use thiserror::Error;

const REASONING_END: &str = "</think>";
const JSON_FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("response has no ```json fence")]
    MissingFence,

    #[error("response has no closing ``` fence")]
    MissingClosingFence,

    #[error("invalid JSON in response: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Parse the fenced JSON payload of a model response.
///
/// Everything up to the end-of-reasoning tag is ignored. Between the first
/// opening fence and the last closing fence the text is trimmed and parsed.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let payload = fenced_payload(text)?;
    Ok(serde_json::from_str(payload)?)
}

/// The raw text between the fences, trimmed.
pub fn fenced_payload(text: &str) -> Result<&str, ExtractError> {
    let response = match text.find(REASONING_END) {
        Some(pos) => &text[pos + REASONING_END.len()..],
        None => text,
    };

    let start = response
        .find(JSON_FENCE_OPEN)
        .ok_or(ExtractError::MissingFence)?
        + JSON_FENCE_OPEN.len();

    let end = response
        .rfind(FENCE)
        .filter(|&end| end >= start)
        .ok_or(ExtractError::MissingClosingFence)?;

    Ok(response[start..end].trim())
}
