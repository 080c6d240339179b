//! Ollama client tests against a mock `/api/generate`.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use summarizerrrr::providers::OllamaClient;
use summarizerrrr::{
    FailureClass, FinishReason, GenerationParams, GenerationRequest, ModelSpec, ProviderClient,
    SummarizerError, TransportMode,
};

fn client(server: &MockServer) -> OllamaClient {
    OllamaClient::with_base_url(reqwest::Client::new(), server.uri())
}

fn model() -> ModelSpec {
    ModelSpec::new("llama3.2")
}

fn request() -> GenerationRequest {
    GenerationRequest::new("ollama", "Be brief.", "Paragraph to summarize.")
}

fn ndjson(lines: &[serde_json::Value]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

#[tokio::test]
async fn block_call_posts_generate_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "prompt": "Paragraph to summarize.",
            "system": "Be brief.",
            "stream": false,
            "options": {"num_predict": 128}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "response": "Brief.",
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 9,
            "eval_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = model().with_params(GenerationParams::new().max_output_tokens(128));
    let result = client(&server)
        .call(&model, None, TransportMode::Block, &request())
        .await
        .unwrap();

    assert_eq!(result.text, "Brief.");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(result.usage.unwrap().total_tokens, 11);
}

#[tokio::test]
async fn stream_call_reads_ndjson_until_done() {
    let server = MockServer::start().await;
    let body = ndjson(&[
        json!({"model": "llama3.2", "response": "Bri", "done": false}),
        json!({"model": "llama3.2", "response": "ef.", "done": false}),
        json!({"model": "llama3.2", "response": "", "done": true, "done_reason": "stop"}),
    ]);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .call(&model(), None, TransportMode::Stream, &request())
        .await
        .unwrap();

    assert_eq!(result.text, "Brief.");
}

#[tokio::test]
async fn stream_without_done_is_transport_failure() {
    let server = MockServer::start().await;
    let body = ndjson(&[json!({"model": "llama3.2", "response": "Bri", "done": false})]);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let ollama = client(&server);
    let err = ollama
        .call(&model(), None, TransportMode::Stream, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::Stream(_)));
    assert_eq!(
        ollama.classify_failure(&err),
        FailureClass::TransportStreamingUnsupported
    );
}

#[tokio::test]
async fn unknown_model_is_not_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model 'llama9' not found"})),
        )
        .mount(&server)
        .await;

    let ollama = client(&server);
    let err = ollama
        .call(&ModelSpec::new("llama9"), None, TransportMode::Block, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::Api { status: 404, ref message } if message.contains("not found")));
    assert_eq!(ollama.classify_failure(&err), FailureClass::Other);
}
