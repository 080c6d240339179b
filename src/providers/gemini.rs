//! Google Gemini client (`generateContent` / `streamGenerateContent`).
//!
//! See: <https://ai.google.dev/api/generate-content>
//!
//! The key travels in the `x-goog-api-key` header rather than the `key`
//! query parameter, so it never shows up in URLs or transport errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::classify::ClassificationTable;
use super::http::check_response;
use super::stream::{read_lines, sse_data};
use super::traits::ProviderClient;
use crate::types::{
    ApiKey, FinishReason, GenerationParams, GenerationRequest, GenerationResult, ModelSpec,
    ProviderKind, TransportMode, Usage,
};
use crate::{Result, SummarizerError};

/// Default base URL for the Gemini API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    classification: ClassificationTable,
}

impl GeminiClient {
    /// Create a client against the public endpoint.
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
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

    fn url(&self, model: &str, transport: TransportMode) -> String {
        match transport {
            TransportMode::Block => {
                format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
            }
            TransportMode::Stream => format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, model
            ),
        }
    }

    async fn send(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<reqwest::Response> {
        let body = GenerateContentRequest::new(request, &model.params);
        let response = self
            .http
            .post(self.url(&model.name, transport))
            .header("x-goog-api-key", api_key.expose())
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }

    async fn generate_blocking(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let response = self
            .send(model, api_key, TransportMode::Block, request)
            .await?;
        let body: GenerateContentResponse = response.json().await?;

        let mut acc = Accumulator::default();
        acc.absorb(body)?;
        acc.into_result(&model.name)
    }

    async fn generate_streaming(
        &self,
        model: &ModelSpec,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let response = self
            .send(model, api_key, TransportMode::Stream, request)
            .await?;

        let mut acc = Accumulator::default();
        read_lines(response, |line| {
            let Some(data) = sse_data(line) else {
                return Ok(());
            };
            let chunk: GenerateContentResponse = serde_json::from_str(data)
                .map_err(|e| SummarizerError::Stream(format!("malformed chunk: {e}")))?;
            acc.absorb(chunk)
        })
        .await?;

        if acc.finish_reason.is_none() {
            return Err(SummarizerError::Stream(
                "stream ended before a finish reason".to_string(),
            ));
        }
        acc.into_result(&model.name)
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %model.name, %transport))]
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
            TransportMode::Block => self.generate_blocking(model, api_key, request).await,
            TransportMode::Stream => self.generate_streaming(model, api_key, request).await,
        }
    }

    fn classification(&self) -> &ClassificationTable {
        &self.classification
    }
}

/// Collects text, usage and finish reason over one or more response chunks.
#[derive(Default)]
struct Accumulator {
    text: String,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

impl Accumulator {
    fn absorb(&mut self, chunk: GenerateContentResponse) -> Result<()> {
        if let Some(feedback) = chunk.prompt_feedback
            && let Some(reason) = feedback.block_reason
        {
            return Err(SummarizerError::InvalidInput(format!(
                "prompt blocked by provider: {reason}"
            )));
        }
        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text {
                        self.text.push_str(&text);
                    }
                }
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason;
            }
        }
        if let Some(meta) = chunk.usage_metadata {
            self.usage = Some(Usage {
                prompt_tokens: meta.prompt_token_count,
                completion_tokens: meta.candidates_token_count,
                total_tokens: meta.total_token_count,
            });
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
                .finish_reason
                .as_deref()
                .map(FinishReason::from_gemini)
                .unwrap_or_default(),
            model: Some(model.to_string()),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(request: &'a GenerationRequest, params: &GenerationParams) -> Self {
        let system_instruction = (!request.system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: &request.system_instruction,
            }],
        });
        Self {
            system_instruction,
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: params.max_output_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let request = GenerationRequest::new("gemini", "Summarize in 3 bullets.", "Article text");
        let params = GenerationParams::new().max_output_tokens(2048).top_p(0.9);
        let body = serde_json::to_value(GenerateContentRequest::new(&request, &params)).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "Summarize in 3 bullets."
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Article text");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn empty_system_instruction_is_omitted() {
        let request = GenerationRequest::new("gemini", "", "hi");
        let body = serde_json::to_value(GenerateContentRequest::new(
            &request,
            &GenerationParams::default(),
        ))
        .unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn accumulator_joins_chunks() {
        let mut acc = Accumulator::default();
        for raw in [
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":", world"}]},"finishReason":"STOP"}],
               "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":3,"totalTokenCount":7}}"#,
        ] {
            acc.absorb(serde_json::from_str(raw).unwrap()).unwrap();
        }
        let result = acc.into_result("gemini-2.5-flash").unwrap();
        assert_eq!(result.text, "Hello, world");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.unwrap().total_tokens, 7);
    }

    #[test]
    fn blocked_prompt_is_invalid_input() {
        let mut acc = Accumulator::default();
        let chunk = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(
            acc.absorb(chunk),
            Err(SummarizerError::InvalidInput(_))
        ));
    }
}
