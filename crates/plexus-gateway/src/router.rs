//! Axum route handlers for the `OpenAI`-compatible gateway surface

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::StreamExt;
use http::HeaderMap;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use plexus_config::ResolvedRoute;
use plexus_core::error::{GatewayError, HttpError};
use plexus_core::types::{
    ChatCompletionRequest, CompletionRequest, EmbeddingRequest, ImageGenerationRequest, RequestPayload,
    ResponsesRequest,
};
use serde_json::Value;

use crate::dispatch::{DispatchOutcome, SseLineStream, dispatch};
use crate::state::GatewayState;

/// Header carrying the JSON routing configuration
pub const ROUTE_HEADER: &str = "x-plexus-config";

/// Build the gateway router with all endpoints
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/completions", routing::post(completions))
        .route("/v1/embeddings", routing::post(embeddings))
        .route("/v1/responses", routing::post(responses))
        .route("/v1/images/generations", routing::post(image_generations))
        .route("/v1/proxy/{*path}", routing::post(proxy))
        .with_state(state)
}

/// Resolve the routing configuration from the header, else the default
fn resolve_route(state: &GatewayState, headers: &HeaderMap) -> Result<ResolvedRoute, GatewayError> {
    match headers.get(ROUTE_HEADER) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| GatewayError::Validation(format!("{ROUTE_HEADER} header is not valid UTF-8")))?;
            plexus_config::parse_route_header(raw, state.config())
        }
        None => ResolvedRoute::default_route(state.config()),
    }
}

/// Parse a typed canonical body, failing fast with a validation error
fn parse_body<T: serde::de::DeserializeOwned>(raw: Value) -> Result<T, GatewayError> {
    serde_json::from_value(raw).map_err(|e| GatewayError::Validation(e.to_string()))
}

/// Run one request through the dispatcher and shape the HTTP response
async fn handle(
    state: GatewayState,
    headers: HeaderMap,
    payload: Result<RequestPayload, GatewayError>,
    forwarded_path: Option<String>,
) -> Response {
    let route = match resolve_route(&state, &headers) {
        Ok(route) => route,
        Err(e) => return error_response(&e),
    };
    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => return error_response(&e),
    };

    match dispatch(&state, &payload, &route, forwarded_path.as_deref()).await {
        Ok(DispatchOutcome::Complete { status, response }) => (status, Json(response.to_json())).into_response(),
        Ok(DispatchOutcome::Stream(lines)) => sse_response(lines),
        Err(e) => error_response(&e),
    }
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(state): State<GatewayState>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let payload = parse_body::<ChatCompletionRequest>(raw).map(RequestPayload::ChatComplete);
    handle(state, headers, payload, None).await
}

/// Handle `POST /v1/completions`
async fn completions(State(state): State<GatewayState>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let payload = parse_body::<CompletionRequest>(raw).map(RequestPayload::Complete);
    handle(state, headers, payload, None).await
}

/// Handle `POST /v1/embeddings`
async fn embeddings(State(state): State<GatewayState>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let payload = parse_body::<EmbeddingRequest>(raw).map(RequestPayload::Embed);
    handle(state, headers, payload, None).await
}

/// Handle `POST /v1/responses`
async fn responses(State(state): State<GatewayState>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let payload = parse_body::<ResponsesRequest>(raw).map(RequestPayload::Responses);
    handle(state, headers, payload, None).await
}

/// Handle `POST /v1/images/generations`
async fn image_generations(State(state): State<GatewayState>, headers: HeaderMap, Json(raw): Json<Value>) -> Response {
    let payload = parse_body::<ImageGenerationRequest>(raw).map(RequestPayload::ImageGenerate);
    handle(state, headers, payload, None).await
}

/// Handle `POST /v1/proxy/{*path}`: forward the body to the provider's path
async fn proxy(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Json(raw): Json<Value>,
) -> Response {
    let forwarded = format!("/{path}");
    handle(state, headers, Ok(RequestPayload::Proxy(raw)), Some(forwarded)).await
}

/// Build a streaming SSE response from canonical `data:` lines
fn sse_response(lines: SseLineStream) -> Response {
    let body = Body::from_stream(lines.map(|line| Ok::<_, std::convert::Infallible>(Bytes::from(line))));
    Response::builder()
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Convert a gateway error into the canonical error response
fn error_response(error: &GatewayError) -> Response {
    let status = error.status_code();
    let body = error.to_error_body();
    tracing::debug!(error = %error, status = %status, "returning error response");
    (status, Json(body)).into_response()
}
