//! Provider descriptors: identity, candidate models, keys and capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which wire protocol a provider speaks.
///
/// The set is closed: every provider id maps to exactly one kind, and the
/// kind selects the client implementation at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Google Gemini (`generateContent`).
    Gemini,
    /// Any OpenAI-compatible `/chat/completions` endpoint
    /// (OpenAI, OpenRouter, Groq, DeepSeek, ...).
    OpenaiCompatible,
    /// A locally hosted Ollama instance.
    Ollama,
}

impl ProviderKind {
    /// Whether the provider runs on the user's machine.
    ///
    /// Locally hosted endpoints are unreachable from a restricted
    /// execution context and have to go through the proxy.
    pub fn is_local(self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }

    /// Whether the provider needs an API key at all.
    pub fn requires_api_key(self) -> bool {
        !self.is_local()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenaiCompatible => "openai-compatible",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters sent with every call to a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl GenerationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max output tokens.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top_p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// One candidate model of a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// An API key. The secret is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Capability flags of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_streaming: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            supports_streaming: true,
        }
    }
}

/// Everything the orchestrator knows about one provider.
///
/// Models are ordered heaviest first: a model downgrade always moves
/// towards the end of the list. Keys are tried in order.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub kind: ProviderKind,
    pub models: Vec<ModelSpec>,
    pub api_keys: Vec<ApiKey>,
    pub capabilities: ProviderCapabilities,
}

impl ProviderDescriptor {
    /// Create a descriptor with no models or keys and default capabilities.
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            models: Vec::new(),
            api_keys: Vec::new(),
            capabilities: ProviderCapabilities::default(),
        }
    }

    /// Append a candidate model (lower priority than those already added).
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    /// Append an API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(ApiKey::new(key));
        self
    }

    pub fn supports_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.supports_streaming = enabled;
        self
    }

    /// Index of the model with the given name.
    pub fn model_index(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name == name)
    }
}
