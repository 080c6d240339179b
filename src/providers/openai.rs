//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that implements `POST /chat/completions`:
//! OpenAI itself, OpenRouter, Groq, DeepSeek, LM Studio, and so on.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::classify::ClassificationTable;
use super::http::{check_response, error_message};
use super::stream::{read_lines, sse_data};
use super::traits::ProviderClient;
use crate::types::{
    ApiKey, FinishReason, GenerationRequest, GenerationResult, ModelSpec, ProviderKind,
    TransportMode, Usage,
};
use crate::{Result, SummarizerError};

/// Default base URL (OpenAI)
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// SSE payload that ends an OpenAI stream.
const DONE_MARKER: &str = "[DONE]";

/// Client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    classification: ClassificationTable,
}

impl OpenAiClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (any compatible endpoint).
    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            classification: ClassificationTable::new(),
        }
    }

    /// Replace the failure classification table.
    pub fn classification_table(mut self, table: ClassificationTable) -> Self {
        self.classification = table;
        self
    }

    async fn send(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        stream: bool,
        request: &GenerationRequest,
    ) -> Result<reqwest::Response> {
        let body = ChatCompletionRequest::new(model, request, stream);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose())
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }

    async fn complete_blocking(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let response = self.send(model, api_key, false, request).await?;
        let body: ChatCompletionResponse = response.json().await?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(SummarizerError::EmptyResponse)?;
        let text = choice.message.content.unwrap_or_default();
        if text.is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        Ok(GenerationResult {
            text,
            usage: body.usage.map(WireUsage::into_usage),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_openai)
                .unwrap_or_default(),
            model: Some(body.model.unwrap_or_else(|| model.name.clone())),
        })
    }

    async fn complete_streaming(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let response = self.send(model, api_key, true, request).await?;

        let mut text = String::new();
        let mut usage = None;
        let mut finish_reason: Option<String> = None;
        let mut done = false;

        read_lines(response, |line| {
            let Some(data) = sse_data(line) else {
                return Ok(());
            };
            if data == DONE_MARKER {
                done = true;
                return Ok(());
            }
            let chunk: ChatCompletionChunk = serde_json::from_str(data)
                .map_err(|e| SummarizerError::Stream(format!("malformed chunk: {e}")))?;
            if let Some(error) = chunk.error {
                return Err(error.into_error(data));
            }
            if let Some(choice) = chunk.choices.into_iter().next() {
                if let Some(delta) = choice.delta.content {
                    text.push_str(&delta);
                }
                if choice.finish_reason.is_some() {
                    finish_reason = choice.finish_reason;
                }
            }
            if let Some(u) = chunk.usage {
                usage = Some(u.into_usage());
            }
            Ok(())
        })
        .await?;

        if !done && finish_reason.is_none() {
            return Err(SummarizerError::Stream(
                "stream ended before [DONE]".to_string(),
            ));
        }
        if text.is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        Ok(GenerationResult {
            text,
            usage,
            finish_reason: finish_reason
                .as_deref()
                .map(FinishReason::from_openai)
                .unwrap_or_default(),
            model: Some(model.name.clone()),
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenaiCompatible
    }

    #[instrument(skip_all, fields(provider = "openai-compatible", model = %model.name, %transport))]
    async fn call(
        &self,
        model: &ModelSpec,
        api_key: Option<&ApiKey>,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let api_key =
            api_key.ok_or_else(|| SummarizerError::MissingApiKey(request.provider_id.clone()))?;
        match transport {
            TransportMode::Block => self.complete_blocking(model, api_key, request).await,
            TransportMode::Stream => self.complete_streaming(model, api_key, request).await,
        }
    }

    fn classification(&self) -> &ClassificationTable {
        &self.classification
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(model: &'a ModelSpec, request: &'a GenerationRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !request.system_instruction.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &request.system_instruction,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.prompt,
        });
        Self {
            model: &model.name,
            messages,
            stream,
            max_tokens: model.params.max_output_tokens,
            temperature: model.params.temperature,
            top_p: model.params.top_p,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// Error object sent inside a 200 stream (OpenRouter and other relays).
#[derive(Deserialize)]
struct StreamError {
    /// Numeric on OpenRouter, a string such as `"server_error"` on OpenAI.
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl StreamError {
    fn into_error(self, data: &str) -> SummarizerError {
        let status = self
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(500);
        SummarizerError::Api {
            status,
            message: error_message(data).unwrap_or_else(|| "error in stream".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl WireUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}
