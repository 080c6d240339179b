//! Gemini client tests against a mock `generateContent` endpoint.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use summarizerrrr::providers::GeminiClient;
use summarizerrrr::{
    ApiKey, FailureClass, FallbackPolicy, FinishReason, GenerationParams, GenerationRequest,
    ModelSpec, ProviderClient, ProviderDescriptor, ProviderKind, Summarizerrrr, SummarizerError,
    TransportMode,
};

const BLOCK_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
const STREAM_PATH: &str = "/v1beta/models/gemini-2.5-flash:streamGenerateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::with_base_url(reqwest::Client::new(), server.uri())
}

fn flash() -> ModelSpec {
    ModelSpec::new("gemini-2.5-flash")
}

fn request() -> GenerationRequest {
    GenerationRequest::new("gemini", "Summarize briefly.", "A long article.")
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 12,
            "candidatesTokenCount": 4,
            "totalTokenCount": 16
        }
    })
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {e}\r\n\r\n"))
        .collect()
}

// ============================================================================
// Block mode
// ============================================================================

#[tokio::test]
async fn block_call_sends_key_header_and_parses_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Summarize briefly."}]},
            "contents": [{"role": "user", "parts": [{"text": "A long article."}]}],
            "generationConfig": {"maxOutputTokens": 512}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Short summary.")))
        .expect(1)
        .mount(&server)
        .await;

    let model = flash().with_params(GenerationParams::new().max_output_tokens(512));
    let result = client(&server)
        .call(&model, Some(&ApiKey::new("test-key")), TransportMode::Block, &request())
        .await
        .unwrap();

    assert_eq!(result.text, "Short summary.");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(result.usage.unwrap().total_tokens, 16);
    assert_eq!(result.model.as_deref(), Some("gemini-2.5-flash"));
}

#[tokio::test]
async fn blocked_prompt_is_invalid_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .call(&flash(), Some(&ApiKey::new("k")), TransportMode::Block, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::InvalidInput(ref m) if m.contains("SAFETY")));
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .call(&flash(), None, TransportMode::Block, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::MissingApiKey(ref p) if p == "gemini"));
}

async fn block_error(gemini: &GeminiClient, key: &str) -> SummarizerError {
    gemini
        .call(&flash(), Some(&ApiKey::new(key)), TransportMode::Block, &request())
        .await
        .unwrap_err()
}

// ============================================================================
// Stream mode
// ============================================================================

#[tokio::test]
async fn stream_call_concatenates_sse_chunks() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"candidates": [{"content": {"parts": [{"text": "Short "}]}}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "summary."}]}, "finishReason": "MAX_TOKENS"}],
               "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}}),
    ]);
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .call(&flash(), Some(&ApiKey::new("k")), TransportMode::Stream, &request())
        .await
        .unwrap();

    assert_eq!(result.text, "Short summary.");
    assert_eq!(result.finish_reason, FinishReason::Length);
    assert_eq!(result.usage.unwrap().completion_tokens, 2);
}

#[tokio::test]
async fn stream_without_finish_reason_is_transport_failure() {
    let server = MockServer::start().await;
    let body = sse(&[json!({"candidates": [{"content": {"parts": [{"text": "Half a sen"}]}}]})]);
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let gemini = client(&server);
    let err = gemini
        .call(&flash(), Some(&ApiKey::new("k")), TransportMode::Stream, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::Stream(_)));
    assert_eq!(
        gemini.classify_failure(&err),
        FailureClass::TransportStreamingUnsupported
    );
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn error_statuses_map_to_failure_classes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "revoked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "throttled"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "busy"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "The model is overloaded. Please try again later.", "status": "UNAVAILABLE"}
        })))
        .mount(&server)
        .await;

    let gemini = client(&server);
    let revoked = block_error(&gemini, "revoked").await;
    assert!(matches!(revoked, SummarizerError::AuthenticationFailed));
    assert_eq!(gemini.classify_failure(&revoked), FailureClass::AuthOrRateLimit);

    let throttled = block_error(&gemini, "throttled").await;
    assert_eq!(throttled.retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(gemini.classify_failure(&throttled), FailureClass::AuthOrRateLimit);

    let busy = block_error(&gemini, "busy").await;
    assert!(matches!(busy, SummarizerError::Api { status: 503, ref message } if message.contains("overloaded")));
    assert_eq!(gemini.classify_failure(&busy), FailureClass::Overload);
}

// ============================================================================
// Through the orchestrator
// ============================================================================

#[tokio::test]
async fn orchestrator_rotates_key_then_downgrades_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .and(header("x-goog-api-key", "first"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .and(header("x-goog-api-key", "second"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"message": "The model is overloaded."}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("From flash.")))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = ProviderDescriptor::new("gemini", ProviderKind::Gemini)
        .model(ModelSpec::new("gemini-2.5-pro"))
        .model(flash())
        .api_key("first")
        .api_key("second");
    let orchestrator = Summarizerrrr::builder()
        .provider_at(descriptor, server.uri())
        .policy(FallbackPolicy::immediate())
        .build()
        .unwrap();

    let generation = orchestrator
        .generate(&request().prefer_streaming(false))
        .await
        .unwrap();

    assert_eq!(generation.result.text, "From flash.");
    assert_eq!(generation.attempts.len(), 3);
}

#[tokio::test]
async fn orchestrator_rotates_past_an_invalid_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "stale"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("x-goog-api-key", "fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("With the fresh key.")))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = ProviderDescriptor::new("gemini", ProviderKind::Gemini)
        .model(flash())
        .api_key("stale")
        .api_key("fresh");
    let orchestrator = Summarizerrrr::builder()
        .provider_at(descriptor, server.uri())
        .policy(FallbackPolicy::immediate())
        .build()
        .unwrap();

    let generation = orchestrator
        .generate(&request().prefer_streaming(false))
        .await
        .unwrap();

    assert_eq!(generation.result.text, "With the fresh key.");
    let keys: Vec<_> = generation.attempts.iter().map(|a| a.key_index).collect();
    assert_eq!(keys, vec![Some(0), Some(1)]);
}

#[tokio::test]
async fn orchestrator_falls_back_to_block_after_broken_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"candidates": [{"content": {"parts": [{"text": "cut"}]}}]})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Whole answer.")))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = ProviderDescriptor::new("gemini", ProviderKind::Gemini)
        .model(flash())
        .api_key("k");
    let orchestrator = Summarizerrrr::builder()
        .provider_at(descriptor, server.uri())
        .policy(FallbackPolicy::immediate())
        .build()
        .unwrap();

    let generation = orchestrator.generate(&request()).await.unwrap();

    assert_eq!(generation.result.text, "Whole answer.");
    let transports: Vec<_> = generation.attempts.iter().map(|a| a.transport).collect();
    assert_eq!(transports, vec![TransportMode::Stream, TransportMode::Block]);
}
