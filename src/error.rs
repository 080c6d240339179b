//! Summarizerrrr error types

use std::time::Duration;

use crate::types::TerminalFailure;

/// Summarizerrrr error types
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Proxy errors
    #[error("proxy unavailable: {0}")]
    ProxyUnavailable(String),

    #[error("proxy rejected call: {0}")]
    ProxyRejected(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Registry errors
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// No further candidate of the given kind ("models", "api keys").
    #[error("no more {0} to try")]
    Exhausted(&'static str),

    #[error("no api key configured for provider {0}")]
    MissingApiKey(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    /// Every downgrade path was spent or the failure was not recoverable.
    #[error(transparent)]
    Terminal(Box<TerminalFailure>),
}

impl SummarizerError {
    /// Provider-supplied wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizerError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Replace every occurrence of `secret` in the error text.
    ///
    /// Provider errors can echo request details back (URLs, headers), so
    /// attempt errors are scrubbed before they reach logs, the attempt
    /// trail or a terminal failure.
    pub fn redact(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        let scrub = |s: String| s.replace(secret, "[redacted]");
        match self {
            SummarizerError::Http(m) => SummarizerError::Http(scrub(m)),
            SummarizerError::Api { status, message } => SummarizerError::Api {
                status,
                message: scrub(message),
            },
            SummarizerError::Stream(m) => SummarizerError::Stream(scrub(m)),
            SummarizerError::ProxyUnavailable(m) => SummarizerError::ProxyUnavailable(scrub(m)),
            SummarizerError::ProxyRejected(m) => SummarizerError::ProxyRejected(scrub(m)),
            SummarizerError::InvalidInput(m) => SummarizerError::InvalidInput(scrub(m)),
            SummarizerError::Configuration(m) => SummarizerError::Configuration(scrub(m)),
            other => other,
        }
    }
}

impl From<TerminalFailure> for SummarizerError {
    fn from(failure: TerminalFailure) -> Self {
        SummarizerError::Terminal(Box::new(failure))
    }
}

impl From<reqwest::Error> for SummarizerError {
    fn from(err: reqwest::Error) -> Self {
        // Drop the URL: some providers take credentials as query parameters.
        SummarizerError::Http(err.without_url().to_string())
    }
}

/// Result type alias for Summarizerrrr operations
pub type Result<T> = std::result::Result<T, SummarizerError>;
