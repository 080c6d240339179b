//! Outcome types: attempt records, successful generations, terminal failures.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::request::TransportMode;
use super::response::GenerationResult;
use crate::SummarizerError;

/// Recovery class of a failed attempt.
///
/// Every provider error maps to exactly one class; unknown failures are
/// [`FailureClass::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Rejected key or rate limit. Recoverable by key rotation.
    AuthOrRateLimit,
    /// Model overloaded. Recoverable by model downgrade.
    Overload,
    /// Stream failed mid-response. Recoverable once by blocking transport.
    TransportStreamingUnsupported,
    /// Not recoverable.
    Other,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::AuthOrRateLimit => "auth_or_rate_limit",
            FailureClass::Overload => "overload",
            FailureClass::TransportStreamingUnsupported => "transport_streaming_unsupported",
            FailureClass::Other => "other",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the attempt trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub model: String,
    /// Index into the provider's key list; `None` for keyless providers.
    pub key_index: Option<usize>,
    pub transport: TransportMode,
    /// Error text (already redacted); `None` for the successful attempt.
    pub error: Option<String>,
}

impl AttemptRecord {
    /// Human-readable key position, 1-based.
    pub fn key_label(&self) -> String {
        match self.key_index {
            Some(i) => format!("key #{}", i + 1),
            None => "no key".to_string(),
        }
    }
}

/// A successful request: the result plus how we got there.
#[derive(Debug, Clone)]
pub struct Generation {
    pub provider: String,
    pub result: GenerationResult,
    /// Every attempt made, the successful one last.
    pub attempts: Vec<AttemptRecord>,
}

impl Generation {
    /// The attempt that produced the result.
    pub fn final_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }

    /// Whether any downgrade happened.
    pub fn used_fallback(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// A request that ended without a result.
#[derive(Debug)]
pub struct TerminalFailure {
    pub provider: String,
    /// Class of the last error.
    pub class: FailureClass,
    pub last_error: SummarizerError,
    /// Every attempt made, the failing one last.
    pub attempts: Vec<AttemptRecord>,
}

impl TerminalFailure {
    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }
}

impl fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation failed for provider {} after {} attempt(s)",
            self.provider,
            self.attempts.len()
        )?;
        if let Some(last) = self.last_attempt() {
            write!(
                f,
                " (last: model {}, {}, {})",
                last.model,
                last.key_label(),
                last.transport
            )?;
        }
        write!(f, ": {} [{}]", self.last_error, self.class)
    }
}

impl std::error::Error for TerminalFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}
