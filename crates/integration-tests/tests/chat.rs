mod harness;

use harness::mock_provider::MockProvider;
use harness::server::TestServer;

/// Route header targeting the mock as an openai-protocol upstream
fn route_header(mock: &MockProvider) -> String {
    format!(
        r#"{{"provider": "openai", "api_key": "test-key", "custom_host": "{}"}}"#,
        mock.openai_base()
    )
}

#[tokio::test]
async fn chat_completion_round_trips_through_the_gateway() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let body = serde_json::json!({
        "model": "mock-model-1",
        "messages": [{"role": "user", "content": "Hello"}]
    });

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-plexus-config", route_header(&mock))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["provider"], "openai");
    assert_eq!(json["model"], "mock-model-1");
    assert_eq!(json["choices"][0]["message"]["content"], "Hello from the mock provider");
    assert_eq!(json["usage"]["total_tokens"], 14);
    assert_eq!(mock.chat_count(), 1);
}

#[tokio::test]
async fn invalid_body_fails_before_any_upstream_call() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    // messages missing entirely
    let body = serde_json::json!({"model": "mock-model-1"});

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-plexus-config", route_header(&mock))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert!(json["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert_eq!(mock.chat_count(), 0);
}

#[tokio::test]
async fn malformed_route_header_is_rejected() {
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-plexus-config", "{broken")
        .json(&serde_json::json!({"model": "m", "messages": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn missing_route_and_default_provider_is_an_error() {
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&serde_json::json!({"model": "m", "messages": [{"role": "user", "content": "x"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["provider"], "plexus");
}

#[tokio::test]
async fn openai_embeddings_round_trip() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/embeddings"))
        .header("x-plexus-config", route_header(&mock))
        .json(&serde_json::json!({"model": "mock-embed", "input": "hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["object"], "list");
    assert_eq!(json["data"][0]["embedding"][0], 0.1);
    // prompt + total reported, completion synthesized
    assert_eq!(json["usage"]["prompt_tokens"], 4);
    assert_eq!(json["usage"]["total_tokens"], 4);
    assert_eq!(mock.embed_count(), 1);
}

#[tokio::test]
async fn ollama_native_embeddings_synthesize_usage() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let header = format!(r#"{{"provider": "ollama", "custom_host": "{}"}}"#, mock.origin());

    let resp = server
        .client()
        .post(server.url("/v1/embeddings"))
        .header("x-plexus-config", header)
        .json(&serde_json::json!({"model": "nomic-embed-text", "input": "hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["provider"], "ollama");
    assert_eq!(json["usage"]["prompt_tokens"], 5);
    assert_eq!(json["usage"]["total_tokens"], 7);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let server = TestServer::start(harness::empty_config()).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}
