//! Request dispatcher
//!
//! Drives one canonical request through its phases: Validated (typed body
//! parsed by the router) → Built (mapping table applied) → Sent → Transformed
//! or `StreamOpened` → Logged → Completed/Failed. Targets are attempted in
//! route order with per-target retries on retryable errors only; every
//! attempt produces a [`RequestLog`], streaming ones completed by a drop
//! guard so aborted streams still get their bookkeeping.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use http::StatusCode;
use plexus_adapters::ProviderAdapter;
use plexus_adapters::registry;
use plexus_config::ResolvedRoute;
use plexus_core::context::ApiContext;
use plexus_core::error::{GatewayError, HttpError};
use plexus_core::log::{DispatchPhase, LogSink, RequestLog};
use plexus_core::types::{
    CanonicalResponse, GatewayFunction, ProviderId, StreamFormat, StreamState, Target, DEFAULT_RETRY_STATUSES,
    DONE_CHUNK, RequestPayload, sse_data,
};
use plexus_core::{generate_id, unix_now};
use serde_json::Value;

use crate::state::GatewayState;

/// Boxed SSE line stream handed back for streaming responses
pub type SseLineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Result of one dispatch
pub enum DispatchOutcome {
    /// Non-streaming response, fully transformed
    Complete {
        /// Status to return to the caller
        status: StatusCode,
        /// Canonical response body
        response: Box<CanonicalResponse>,
    },
    /// Streaming response; lines are complete `data: ...\n\n` frames
    Stream(SseLineStream),
}

/// Dispatch one canonical request across the route's targets
pub async fn dispatch(
    state: &GatewayState,
    payload: &RequestPayload,
    route: &ResolvedRoute,
    forwarded_path: Option<&str>,
) -> Result<DispatchOutcome, GatewayError> {
    let function = payload.function();
    let body = payload.to_value();
    let timeout = Duration::from_secs(
        route
            .timeout_secs
            .unwrap_or(state.config().gateway.request_timeout_secs),
    );

    let mut attempt: u32 = 0;
    let mut last_error: Option<GatewayError> = None;

    for target in &route.targets {
        let retry = target.retry.clone().unwrap_or_default();
        let retry_statuses = if retry.on_status.is_empty() {
            DEFAULT_RETRY_STATUSES.to_vec()
        } else {
            retry.on_status.clone()
        };

        for _ in 0..retry.effective_attempts() {
            match dispatch_once(state, payload, &body, target, function, forwarded_path, timeout, attempt, route)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    let retryable = err.is_retryable(&retry_statuses);
                    tracing::warn!(
                        provider = %target.provider,
                        %function,
                        attempt,
                        error = %err,
                        retryable,
                        "dispatch attempt failed"
                    );
                    attempt += 1;
                    if !retryable && !failover_eligible(&err) {
                        return Err(err);
                    }
                    let stop_retrying = !retryable;
                    last_error = Some(err);
                    if stop_retrying {
                        break;
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| GatewayError::Validation("route resolved to no targets".to_owned())))
}

/// Whether an error justifies moving on to the next target
///
/// Caller mistakes (validation, missing parameters, bad hosts) fail the
/// whole request; provider-side trouble is worth another target.
const fn failover_eligible(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::Upstream { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::InvalidProviderResponse { .. }
            | GatewayError::StreamTransform { .. }
    )
}

/// One attempt against one target
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
async fn dispatch_once(
    state: &GatewayState,
    payload: &RequestPayload,
    body: &Value,
    target: &Target,
    function: GatewayFunction,
    forwarded_path: Option<&str>,
    timeout: Duration,
    attempt: u32,
    route: &ResolvedRoute,
) -> Result<DispatchOutcome, GatewayError> {
    let adapter = registry::adapter(target.provider);
    let provider = adapter.id();
    let started = Instant::now();

    let ctx = ApiContext {
        target,
        function,
        body,
        forwarded_path,
    };

    // Built
    let provider_body = build_provider_body(adapter, &ctx, body)?;

    let base = adapter.api().base_url(&ctx)?;
    let endpoint = adapter.api().endpoint(&ctx)?;
    if endpoint.is_empty() && function != GatewayFunction::Proxy {
        return Err(plexus_adapters::adapter::unsupported_function(provider, function));
    }
    let url = format!("{base}{endpoint}");
    let headers = adapter.api().headers(&ctx)?;

    tracing::debug!(provider = %provider, %function, %url, attempt, "sending upstream request");

    // Sent
    let request = state
        .client()
        .post(&url)
        .headers(headers)
        .json(&provider_body)
        .timeout(timeout);

    let response = match tokio::time::timeout(timeout, request.send()).await {
        Err(_elapsed) => {
            let err = GatewayError::Timeout {
                provider,
                timeout_secs: timeout.as_secs(),
            };
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: err.status_code().as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: None,
                phase: DispatchPhase::Failed,
                first_token_ms: None,
                started,
                route,
            });
            return Err(err);
        }
        Ok(Err(e)) => {
            let err = if e.is_timeout() {
                GatewayError::Timeout {
                    provider,
                    timeout_secs: timeout.as_secs(),
                }
            } else {
                GatewayError::network(provider, format!("request to {provider} failed: {e}"))
            };
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: err.status_code().as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: None,
                phase: DispatchPhase::Failed,
                first_token_ms: None,
                started,
                route,
            });
            return Err(err);
        }
        Ok(Ok(response)) => response,
    };

    let status = response.status();

    if payload.stream() && status.is_success() {
        // StreamOpened
        return Ok(DispatchOutcome::Stream(open_stream(
            state, response, adapter, target, function, body, forwarded_path, attempt, route, started, &url,
            &provider_body,
        )));
    }

    // Transformed
    let raw_body = match tokio::time::timeout(timeout, response.bytes()).await {
        Err(_elapsed) => {
            let err = GatewayError::Timeout {
                provider,
                timeout_secs: timeout.as_secs(),
            };
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: err.status_code().as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: None,
                phase: DispatchPhase::Failed,
                first_token_ms: None,
                started,
                route,
            });
            return Err(err);
        }
        Ok(Err(e)) => {
            let err = GatewayError::network(provider, format!("failed reading response: {e}"));
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: err.status_code().as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: None,
                phase: DispatchPhase::Failed,
                first_token_ms: None,
                started,
                route,
            });
            return Err(err);
        }
        Ok(Ok(bytes)) => bytes,
    };

    let upstream_json: Value = serde_json::from_slice(&raw_body).unwrap_or_else(|_| {
        // Non-JSON upstream bodies still flow through the error normalizer
        Value::String(String::from_utf8_lossy(&raw_body).into_owned())
    });

    let result = transform_upstream(adapter, function, &upstream_json, status, &ctx);

    match result {
        Ok(response) => {
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: StatusCode::OK.as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: Some(response.to_json()),
                phase: DispatchPhase::Completed,
                first_token_ms: None,
                started,
                route,
            });
            Ok(DispatchOutcome::Complete {
                status: StatusCode::OK,
                response: Box::new(response),
            })
        }
        Err(err) => {
            log_attempt(state, &LogParams {
                provider,
                function,
                url: &url,
                status: err.status_code().as_u16(),
                attempt,
                stream: false,
                request_body: &provider_body,
                response_body: Some(serde_json::to_value(err.to_error_body()).unwrap_or(Value::Null)),
                phase: DispatchPhase::Failed,
                first_token_ms: None,
                started,
                route,
            });
            Err(err)
        }
    }
}

/// Apply the mapping table, or pass the body through for proxy calls
fn build_provider_body(
    adapter: &'static dyn ProviderAdapter,
    ctx: &ApiContext<'_>,
    body: &Value,
) -> Result<Value, GatewayError> {
    if ctx.function == GatewayFunction::Proxy {
        return Ok(body.clone());
    }
    let table = adapter
        .table(ctx.function)
        .ok_or_else(|| plexus_adapters::adapter::unsupported_function(adapter.id(), ctx.function))?;
    let built = plexus_adapters::build_request(adapter.id(), table, body, ctx.target)?;
    Ok(Value::Object(built))
}

/// Route the upstream JSON through the adapter, converting error bodies into
/// typed gateway errors that keep the upstream status
fn transform_upstream(
    adapter: &'static dyn ProviderAdapter,
    function: GatewayFunction,
    upstream: &Value,
    status: StatusCode,
    ctx: &ApiContext<'_>,
) -> Result<CanonicalResponse, GatewayError> {
    match adapter.transform_response(function, upstream, status, ctx) {
        Ok(response) => Ok(response),
        Err(error_body) => {
            let provider = adapter.id();
            if error_body.error.error_type.as_deref() == Some("invalid_provider_response") {
                Err(GatewayError::InvalidProviderResponse {
                    provider,
                    body: Box::new(error_body),
                })
            } else {
                let upstream_status = error_body.status.unwrap_or_else(|| {
                    if status.is_success() {
                        StatusCode::BAD_GATEWAY.as_u16()
                    } else {
                        status.as_u16()
                    }
                });
                Err(GatewayError::Upstream {
                    provider,
                    status: upstream_status,
                    body: Box::new(error_body),
                })
            }
        }
    }
}

// -- Streaming --

/// Per-stream bookkeeping completed by `Drop`, so client aborts still log
struct StreamLogGuard {
    sink: Arc<dyn LogSink>,
    log: Option<RequestLog>,
    started: Instant,
}

impl StreamLogGuard {
    fn finish(&mut self, state: Option<&StreamState>, first_token_ms: Option<u64>, status: u16, phase: DispatchPhase) {
        if let Some(mut log) = self.log.take() {
            log.status = status;
            log.phase = phase;
            log.first_token_ms = first_token_ms;
            #[allow(clippy::cast_possible_truncation)]
            {
                log.latency_ms = self.started.elapsed().as_millis() as u64;
            }
            log.response_body = state.map(|s| serde_json::json!({"content": s.collected_content}));
            let sink = Arc::clone(&self.sink);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { sink.create_log(log).await });
            }
        }
    }
}

impl Drop for StreamLogGuard {
    fn drop(&mut self) {
        // Aborted mid-flight: close out the log so it is not left half-written.
        // 499 is the de-facto "client closed request" status.
        if self.log.is_some() {
            self.finish(None, None, 499, DispatchPhase::StreamOpened);
        }
    }
}

struct StreamDriver {
    adapter: &'static dyn ProviderAdapter,
    target: Target,
    function: GatewayFunction,
    body: Value,
    forwarded_path: Option<String>,
    state: StreamState,
    fallback_id: String,
    first_token_ms: Option<u64>,
    started: Instant,
    guard: StreamLogGuard,
    pending: VecDeque<String>,
    terminated: bool,
}

impl StreamDriver {
    /// Transform one raw upstream payload, queueing the resulting lines
    fn feed(&mut self, raw: &str) -> Result<(), GatewayError> {
        let ctx = ApiContext {
            target: &self.target,
            function: self.function,
            body: &self.body,
            forwarded_path: self.forwarded_path.as_deref(),
        };
        let line = self
            .adapter
            .transform_chunk(self.function, raw, &self.fallback_id, &mut self.state, &ctx)?;
        if let Some(line) = line {
            if self.first_token_ms.is_none() {
                #[allow(clippy::cast_possible_truncation)]
                {
                    self.first_token_ms = Some(self.started.elapsed().as_millis() as u64);
                }
            }
            self.pending.push_back(line);
        }
        Ok(())
    }

    /// Convert a mid-stream error into terminal frames
    fn terminate_with_error(&mut self, err: &GatewayError) {
        let error_line = sse_data(&serde_json::to_value(err.to_error_body()).unwrap_or(Value::Null));
        self.pending.push_back(error_line);
        if !self.state.finished {
            self.pending.push_back(DONE_CHUNK.to_owned());
            self.state.finished = true;
        }
        self.terminated = true;
        self.guard.finish(
            Some(&self.state),
            self.first_token_ms,
            err.status_code().as_u16(),
            DispatchPhase::Failed,
        );
    }

    /// Close out a stream that ended normally
    fn terminate_cleanly(&mut self) {
        if !self.state.finished {
            self.pending.push_back(DONE_CHUNK.to_owned());
            self.state.finished = true;
        }
        self.terminated = true;
        self.guard
            .finish(Some(&self.state), self.first_token_ms, StatusCode::OK.as_u16(), DispatchPhase::Completed);
    }
}

/// Wrap an upstream streaming response into canonical SSE lines
#[allow(clippy::too_many_arguments)]
fn open_stream(
    state: &GatewayState,
    response: reqwest::Response,
    adapter: &'static dyn ProviderAdapter,
    target: &Target,
    function: GatewayFunction,
    body: &Value,
    forwarded_path: Option<&str>,
    attempt: u32,
    route: &ResolvedRoute,
    started: Instant,
    url: &str,
    provider_body: &Value,
) -> SseLineStream {
    let provider = adapter.id();
    let fallback_id = generate_id(match function {
        GatewayFunction::Complete => "cmpl",
        _ => "chatcmpl",
    });

    // Log skeleton completed by the guard on stream end or abort
    let log = RequestLog {
        id: generate_id("log"),
        provider,
        function,
        method: "POST".to_owned(),
        url: url.to_owned(),
        status: StatusCode::OK.as_u16(),
        attempt,
        stream: true,
        request_body: provider_body.clone(),
        response_body: None,
        route: route.redacted_json(),
        cache_status: plexus_core::log::CacheStatus::Disabled,
        phase: DispatchPhase::StreamOpened,
        first_token_ms: None,
        latency_ms: 0,
        created_at: unix_now(),
        metadata: route.metadata.clone(),
    };

    let driver = StreamDriver {
        adapter,
        target: target.clone(),
        function,
        body: body.clone(),
        forwarded_path: forwarded_path.map(str::to_owned),
        state: StreamState::default(),
        fallback_id,
        first_token_ms: None,
        started,
        guard: StreamLogGuard {
            sink: state.sink(),
            log: Some(log),
            started,
        },
        pending: VecDeque::new(),
        terminated: false,
    };

    let raw_payloads = raw_payload_stream(response, adapter.stream_format());

    let lines = futures_util::stream::unfold((driver, raw_payloads), |(mut driver, mut raw_payloads)| async move {
        loop {
            if let Some(line) = driver.pending.pop_front() {
                return Some((line, (driver, raw_payloads)));
            }
            if driver.terminated {
                return None;
            }
            match raw_payloads.next().await {
                Some(Ok(raw)) => {
                    if let Err(err) = driver.feed(&raw) {
                        tracing::warn!(provider = %driver.adapter.id(), error = %err, "stream transform failed");
                        driver.terminate_with_error(&err);
                    }
                }
                Some(Err(message)) => {
                    let err = GatewayError::StreamTransform {
                        provider: driver.adapter.id(),
                        message,
                    };
                    driver.terminate_with_error(&err);
                }
                None => driver.terminate_cleanly(),
            }
        }
    });

    Box::pin(lines)
}

/// Split an upstream body into raw chunk payloads per the provider's framing
fn raw_payload_stream(
    response: reqwest::Response,
    format: StreamFormat,
) -> Pin<Box<dyn Stream<Item = Result<String, String>> + Send>> {
    match format {
        StreamFormat::Sse => {
            let events = response.bytes_stream().eventsource().map(|result| match result {
                Ok(event) => Ok(event.data),
                Err(e) => Err(e.to_string()),
            });
            Box::pin(events)
        }
        StreamFormat::JsonLines => {
            let lines = response
                .bytes_stream()
                .scan(String::new(), |buffer, result| {
                    let out: Vec<Result<String, String>> = match result {
                        Ok(bytes) => {
                            buffer.push_str(&String::from_utf8_lossy(&bytes));
                            let mut complete = Vec::new();
                            while let Some(pos) = buffer.find('\n') {
                                let line = buffer[..pos].trim().to_owned();
                                buffer.drain(..=pos);
                                if !line.is_empty() {
                                    complete.push(Ok(line));
                                }
                            }
                            complete
                        }
                        Err(e) => vec![Err(e.to_string())],
                    };
                    futures_util::future::ready(Some(out))
                })
                .flat_map(futures_util::stream::iter);
            Box::pin(lines)
        }
    }
}

// -- Attempt logging --

struct LogParams<'a> {
    provider: ProviderId,
    function: GatewayFunction,
    url: &'a str,
    status: u16,
    attempt: u32,
    stream: bool,
    request_body: &'a Value,
    response_body: Option<Value>,
    phase: DispatchPhase,
    first_token_ms: Option<u64>,
    started: Instant,
    route: &'a ResolvedRoute,
}

/// Hand one finished attempt to the log sink without blocking dispatch
fn log_attempt(state: &GatewayState, params: &LogParams<'_>) {
    #[allow(clippy::cast_possible_truncation)]
    let log = RequestLog {
        id: generate_id("log"),
        provider: params.provider,
        function: params.function,
        method: "POST".to_owned(),
        url: params.url.to_owned(),
        status: params.status,
        attempt: params.attempt,
        stream: params.stream,
        request_body: params.request_body.clone(),
        response_body: params.response_body.clone(),
        route: params.route.redacted_json(),
        cache_status: plexus_core::log::CacheStatus::Disabled,
        phase: params.phase,
        first_token_ms: params.first_token_ms,
        latency_ms: params.started.elapsed().as_millis() as u64,
        created_at: unix_now(),
        metadata: params.route.metadata.clone(),
    };

    let sink = state.sink();
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move { sink.create_log(log).await });
    }
}
