//! Request-side types: what to generate, and where the call comes from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single logical "generate" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System instruction (summary style, language, format).
    pub system_instruction: String,

    /// User prompt (the extracted page or transcript content).
    pub prompt: String,

    /// Provider to send the request to.
    pub provider_id: String,

    /// Explicit model, bypassing the provider's first candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,

    /// Whether the caller would like a streamed response.
    ///
    /// Only a preference: the dispatcher forces blocking mode when the
    /// provider or the execution context cannot stream.
    #[serde(default = "default_prefer_streaming")]
    pub prefer_streaming: bool,
}

fn default_prefer_streaming() -> bool {
    true
}

impl GenerationRequest {
    /// Create a request for the given provider.
    pub fn new(
        provider_id: impl Into<String>,
        system_instruction: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            prompt: prompt.into(),
            provider_id: provider_id.into(),
            model_override: None,
            prefer_streaming: true,
        }
    }

    /// Use a specific model instead of the provider's first candidate.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Set the streaming preference.
    pub fn prefer_streaming(mut self, prefer: bool) -> Self {
        self.prefer_streaming = prefer;
        self
    }
}

/// How a response is delivered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Incremental output over SSE / NDJSON.
    Stream,
    /// One complete response body.
    Block,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Stream => "stream",
            TransportMode::Block => "block",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the calling code runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// May reach any endpoint directly (background worker, CLI).
    #[default]
    Privileged,
    /// Sandboxed page context: no locally hosted endpoints, no streaming.
    Restricted,
}

impl ExecutionContext {
    pub fn is_restricted(self) -> bool {
        matches!(self, ExecutionContext::Restricted)
    }
}
