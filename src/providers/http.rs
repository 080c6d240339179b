//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use serde_json::Value;

use crate::{Result, SummarizerError};

/// Default per-request timeout for provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Build the HTTP client shared by all provider clients.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SummarizerError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Pass a successful response through; map an error response to an error.
///
/// - 401 → [`SummarizerError::AuthenticationFailed`]
/// - 429 → [`SummarizerError::RateLimited`] with the `retry-after` hint
/// - anything else → [`SummarizerError::Api`] with the provider's message
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 => Err(SummarizerError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(SummarizerError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(SummarizerError::Api {
                status: code,
                message: error_message(&body)
                    .unwrap_or_else(|| format!("HTTP {status}")),
            })
        }
    }
}

/// Extract a readable message from a provider error body.
///
/// Understands `{"error": {"message": ...}}` (Gemini, OpenAI) and
/// `{"error": "..."}` (Ollama); falls back to the raw body, truncated.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match json.get("error") {
            Some(Value::String(message)) => return Some(message.clone()),
            Some(Value::Object(obj)) => {
                if let Some(Value::String(message)) = obj.get("message") {
                    return Some(message.clone());
                }
            }
            _ => {}
        }
    }
    Some(truncate(body, MAX_ERROR_BODY))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
