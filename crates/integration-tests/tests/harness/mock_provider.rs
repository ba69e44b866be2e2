//! Mock upstream provider for integration tests
//!
//! Speaks enough of the `OpenAI` wire protocol (plus Ollama's native
//! embeddings shape) to exercise the gateway end to end, with switchable
//! failure and malformed-stream modes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock provider backend with predictable responses
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    chat_count: AtomicU32,
    embed_count: AtomicU32,
    /// Requests to fail with 429 before succeeding (0 = never fail)
    fail_count: AtomicU32,
    /// Inject one unparseable line mid-stream
    malformed_chunk: bool,
}

impl MockProvider {
    /// Start a well-behaved mock
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, false).await
    }

    /// Start a mock that 429s the first `n` requests
    pub async fn start_rate_limited(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, false).await
    }

    /// Start a mock that injects a malformed streaming chunk
    pub async fn start_with_malformed_chunk() -> anyhow::Result<Self> {
        Self::start_inner(0, true).await
    }

    async fn start_inner(fail_count: u32, malformed_chunk: bool) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            chat_count: AtomicU32::new(0),
            embed_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            malformed_chunk,
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat))
            .route("/v1/embeddings", routing::post(handle_embeddings))
            .route("/api/embeddings", routing::post(handle_ollama_embeddings))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Origin of the mock (no path prefix)
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Origin plus `/v1`, for providers whose base URL carries the prefix
    pub fn openai_base(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Chat requests served so far
    pub fn chat_count(&self) -> u32 {
        self.state.chat_count.load(Ordering::Relaxed)
    }

    /// Embedding requests served so far
    pub fn embed_count(&self) -> u32 {
        self.state.embed_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn take_failure(state: &MockState) -> bool {
    state
        .fail_count
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn handle_chat(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.chat_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limited"}))).into_response();
    }

    let model = body.get("model").and_then(Value::as_str).unwrap_or("mock-model");

    if body.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        let mut frames = vec![
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": model,
                "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hello"}, "finish_reason": null}]
            })
            .to_string(),
        ];
        if state.malformed_chunk {
            frames.push("this is not json".to_owned());
        }
        frames.push(
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": model,
                "choices": [{"index": 0, "delta": {"content": " world"}, "finish_reason": "stop"}]
            })
            .to_string(),
        );

        let mut sse = String::new();
        for frame in frames {
            sse.push_str("data: ");
            sse.push_str(&frame);
            sse.push_str("\n\n");
        }
        sse.push_str("data: [DONE]\n\n");

        return Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from(sse))
            .expect("valid response");
    }

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello from the mock provider"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 5, "total_tokens": 14}
    }))
    .into_response()
}

async fn handle_embeddings(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.embed_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limited"}))).into_response();
    }

    let model = body.get("model").and_then(Value::as_str).unwrap_or("mock-embed");
    Json(json!({
        "object": "list",
        "data": [{"object": "embedding", "embedding": [0.1, 0.2, 0.3], "index": 0}],
        "model": model,
        "usage": {"prompt_tokens": 4, "total_tokens": 4}
    }))
    .into_response()
}

async fn handle_ollama_embeddings(State(state): State<Arc<MockState>>, Json(_body): Json<Value>) -> Response {
    state.embed_count.fetch_add(1, Ordering::Relaxed);
    Json(json!({
        "embedding": [0.5, 0.25, 0.125],
        "prompt_eval_count": 5,
        "eval_count": 2
    }))
    .into_response()
}
