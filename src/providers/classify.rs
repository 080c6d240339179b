//! Failure classification: provider error → [`FailureClass`].
//!
//! Which signals mean "overloaded" and which mean "rejected key" differ
//! between providers, so the mapping is a table. Rules supplied through
//! configuration are consulted first, in order; the built-in defaults
//! apply when no rule matches. The mapping is total: anything that no
//! rule or default recognises is [`FailureClass::Other`].
//!
//! ```toml
//! [[providers.classification]]
//! status = 500
//! class = "overload"
//!
//! [[providers.classification]]
//! message_contains = "quota"
//! class = "auth_or_rate_limit"
//! ```

use serde::Deserialize;

use crate::SummarizerError;
use crate::types::FailureClass;

/// HTTP statuses treated as a rejected key or rate limit by default.
const AUTH_OR_RATE_LIMIT_STATUSES: &[u16] = &[401, 403, 429];

/// HTTP statuses treated as an overloaded model by default.
/// 529 is Anthropic-style "overloaded", also used by some OpenAI-compatible relays.
const OVERLOAD_STATUSES: &[u16] = &[503, 529];

/// Message fragments treated as a rejected key or rate limit by default
/// (matched lowercase). Gemini answers a bad key with 400 `INVALID_ARGUMENT`.
const AUTH_OR_RATE_LIMIT_MESSAGES: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "incorrect api key",
    "invalid api key",
    "resource_exhausted",
];

/// Message fragments treated as overload by default (matched lowercase).
const OVERLOAD_MESSAGES: &[&str] = &["overloaded", "model is currently unavailable"];

/// One configurable classification rule.
///
/// A rule matches when every condition it sets matches. A rule with no
/// conditions never matches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassificationRule {
    /// HTTP status of an API error.
    #[serde(default)]
    pub status: Option<u16>,
    /// Case-insensitive fragment of the error text.
    #[serde(default)]
    pub message_contains: Option<String>,
    pub class: FailureClass,
}

impl ClassificationRule {
    pub fn status(status: u16, class: FailureClass) -> Self {
        Self {
            status: Some(status),
            message_contains: None,
            class,
        }
    }

    pub fn message(fragment: impl Into<String>, class: FailureClass) -> Self {
        Self {
            status: None,
            message_contains: Some(fragment.into()),
            class,
        }
    }

    fn matches(&self, err: &SummarizerError, lowered: &str) -> bool {
        if self.status.is_none() && self.message_contains.is_none() {
            return false;
        }
        let status_ok = match self.status {
            Some(wanted) => matches!(err, SummarizerError::Api { status, .. } if *status == wanted),
            None => true,
        };
        let message_ok = match &self.message_contains {
            Some(fragment) => lowered.contains(&fragment.to_lowercase()),
            None => true,
        };
        status_ok && message_ok
    }
}

/// Ordered classification rules plus built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct ClassificationTable {
    rules: Vec<ClassificationRule>,
}

impl ClassificationTable {
    /// Table with only the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with custom rules consulted before the defaults.
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Append a rule (lower priority than those already present).
    pub fn push(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify an error.
    pub fn classify(&self, err: &SummarizerError) -> FailureClass {
        let lowered = err.to_string().to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.matches(err, &lowered)) {
            return rule.class;
        }
        Self::default_class(err, &lowered)
    }

    fn default_class(err: &SummarizerError, lowered: &str) -> FailureClass {
        match err {
            SummarizerError::AuthenticationFailed | SummarizerError::RateLimited { .. } => {
                FailureClass::AuthOrRateLimit
            }
            SummarizerError::Api { status, .. } if AUTH_OR_RATE_LIMIT_STATUSES.contains(status) => {
                FailureClass::AuthOrRateLimit
            }
            SummarizerError::Api { status, .. } if OVERLOAD_STATUSES.contains(status) => {
                FailureClass::Overload
            }
            SummarizerError::Stream(_) => FailureClass::TransportStreamingUnsupported,
            SummarizerError::Api { .. }
                if AUTH_OR_RATE_LIMIT_MESSAGES.iter().any(|m| lowered.contains(m)) =>
            {
                FailureClass::AuthOrRateLimit
            }
            SummarizerError::Api { .. }
                if OVERLOAD_MESSAGES.iter().any(|m| lowered.contains(m)) =>
            {
                FailureClass::Overload
            }
            _ => FailureClass::Other,
        }
    }
}
