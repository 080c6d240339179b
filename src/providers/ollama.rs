//! Ollama client (`/api/generate`).
//!
//! Ollama runs on the user's machine and needs no key. Streaming responses
//! are newline-delimited JSON objects; the last one carries `"done": true`
//! along with the token counts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::classify::ClassificationTable;
use super::http::check_response;
use super::stream::read_lines;
use super::traits::ProviderClient;
use crate::types::{
    ApiKey, FinishReason, GenerationParams, GenerationRequest, GenerationResult, ModelSpec,
    ProviderKind, TransportMode, Usage,
};
use crate::{Result, SummarizerError};

/// Default local endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    classification: ClassificationTable,
}

impl OllamaClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

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
        stream: bool,
        request: &GenerationRequest,
    ) -> Result<reqwest::Response> {
        let body = GenerateRequest {
            model: &model.name,
            prompt: &request.prompt,
            system: (!request.system_instruction.is_empty())
                .then_some(request.system_instruction.as_str()),
            stream,
            options: WireOptions::from_params(&model.params),
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }
}

#[async_trait]
impl ProviderClient for OllamaClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    #[instrument(skip_all, fields(provider = "ollama", model = %model.name, %transport))]
    async fn call(
        &self,
        model: &ModelSpec,
        _api_key: Option<&ApiKey>,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let streaming = transport == TransportMode::Stream;
        let response = self.send(model, streaming, request).await?;

        let mut acc = Accumulator::default();
        if streaming {
            read_lines(response, |line| {
                let chunk: GenerateChunk = serde_json::from_str(line)
                    .map_err(|e| SummarizerError::Stream(format!("malformed chunk: {e}")))?;
                acc.absorb(chunk)
            })
            .await?;
            if !acc.done {
                return Err(SummarizerError::Stream(
                    "stream ended before done".to_string(),
                ));
            }
        } else {
            let body: GenerateChunk = response.json().await?;
            acc.absorb(body)?;
        }
        acc.into_result(&model.name)
    }

    fn classification(&self) -> &ClassificationTable {
        &self.classification
    }
}

#[derive(Default)]
struct Accumulator {
    text: String,
    done: bool,
    done_reason: Option<String>,
    usage: Option<Usage>,
}

impl Accumulator {
    fn absorb(&mut self, chunk: GenerateChunk) -> Result<()> {
        if let Some(error) = chunk.error {
            return Err(SummarizerError::Stream(error));
        }
        self.text.push_str(&chunk.response);
        if chunk.done {
            self.done = true;
            self.done_reason = chunk.done_reason;
            if let (Some(p), Some(c)) = (chunk.prompt_eval_count, chunk.eval_count) {
                self.usage = Some(Usage::new(p, c));
            }
        }
        Ok(())
    }

    fn into_result(self, model: &str) -> Result<GenerationResult> {
        if self.text.is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        Ok(GenerationResult {
            text: self.text,
            usage: self.usage,
            finish_reason: self
                .done_reason
                .as_deref()
                .map(FinishReason::from_openai)
                .unwrap_or_default(),
            model: Some(model.to_string()),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "WireOptions::is_empty")]
    options: WireOptions,
}

#[derive(Serialize, Default)]
struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl WireOptions {
    fn from_params(params: &GenerationParams) -> Self {
        Self {
            num_predict: params.max_output_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        }
    }

    fn is_empty(&self) -> bool {
        self.num_predict.is_none() && self.temperature.is_none() && self.top_p.is_none()
    }
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}
