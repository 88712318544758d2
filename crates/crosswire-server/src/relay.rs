//! Request orchestration.
//!
//! One handler drives the whole pipeline: identify the client, pick an
//! account, translate the Messages body, adapt it, open the upstream
//! stream, and then either transcode SSE frames live or collect the
//! terminal payload into a single JSON body. Upstream error statuses are
//! surfaced in whichever framing the client asked for.

use std::convert::Infallible;
use std::sync::{Arc, LazyLock};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use regex::Regex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use crosswire_bridge::adapter::{AdaptContext, adapt};
use crosswire_bridge::collect::collect_completed;
use crosswire_bridge::convert::response_to_message;
use crosswire_bridge::request::{TranslatedRequest, translate_request};
use crosswire_bridge::stream::StreamConverter;
use crosswire_bridge::upstream::{UpstreamClient, UpstreamEventStream, prepare_outbound};
use crosswire_bridge::{BridgeError, sanitize_message};
use crosswire_common::account::SelectedAccount;
use crosswire_common::ids::ToolCallIdMap;
use crosswire_common::messages::{ApiError, ErrorBody, MessagesRequest, MessagesUsage, StreamFrame};
use crosswire_common::usage::{RateLimitSnapshot, UsageTally};

use crate::config::ServerConfig;
use crate::scheduler::Scheduler;
use crate::sink::{MetricsSink, UsageRecord};

/// Header naming the API key the client authenticated with.
const API_KEY_ID_HEADER: &str = "x-api-key-id";

/// Header carrying the caller-derived session hash for sticky scheduling.
const SESSION_HASH_HEADER: &str = "x-session-hash";

#[allow(clippy::unwrap_used)]
static CLI_USER_AGENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(codex_vscode|codex_cli_rs|codex_exec)/\d+(\.\d+)*").unwrap());

/// Process-wide collaborators, shared read-only across requests.
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Upstream HTTP client.
    pub upstream: UpstreamClient,
    /// Account scheduler.
    pub scheduler: Arc<dyn Scheduler>,
    /// Usage and telemetry sink.
    pub sink: Arc<dyn MetricsSink>,
}

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/messages", post(handle_messages))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Whether the user agent is one of the codex CLI family.
fn is_cli_client(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| CLI_USER_AGENT.is_match(agent))
}

/// Strip a `<vendor>,` routing prefix off the requested model.
fn strip_vendor_prefix(model: &str) -> &str {
    model.split_once(',').map_or(model, |(_, base)| base)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Everything the completion paths need after the upstream is open.
struct RequestContext {
    state: Arc<AppState>,
    account: SelectedAccount,
    api_key_id: String,
    session_hash: Option<String>,
    model: String,
    rate_limits: RateLimitSnapshot,
}

async fn handle_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request: MessagesRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(parse_error) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                ApiError::new(
                    "invalid_request_error",
                    format!("malformed request body: {parse_error}"),
                ),
            );
        }
    };

    let wants_stream = request.stream.unwrap_or(false);
    request.model = strip_vendor_prefix(&request.model).to_string();

    let is_cli = is_cli_client(&headers);
    let api_key_id = header_str(&headers, API_KEY_ID_HEADER)
        .unwrap_or("anonymous")
        .to_string();
    let session_hash = header_str(&headers, SESSION_HASH_HEADER).map(ToString::to_string);

    let account = match state
        .scheduler
        .select_account(&api_key_id, session_hash.as_deref(), &request.model)
        .await
    {
        Ok(account) => account,
        Err(select_error) => {
            warn!("account selection failed: {select_error}");
            return respond_error(
                wants_stream,
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("overloaded_error", select_error.to_string()),
            );
        }
    };

    let TranslatedRequest {
        body: translated,
        tool_ids,
        model,
    } = translate_request(&request);

    let outbound = match serde_json::to_value(&translated) {
        Ok(value) => value,
        Err(serialize_error) => {
            error!("failed to serialize outbound body: {serialize_error}");
            return respond_error(
                wants_stream,
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("api_error", "internal translation failure"),
            );
        }
    };

    let ctx = AdaptContext {
        is_cli,
        config: &state.config.adapter,
        default_text: &state.config.default_instructions,
    };
    let outcome = adapt(&outbound, &ctx);
    if outcome.applied {
        debug!(
            stripped = ?outcome.changes.stripped_fields,
            "outbound body adapted"
        );
    }
    let mut outbound = outcome.body;
    prepare_outbound(&mut outbound, account.account_type);

    let connection = match state.upstream.open(&outbound, &account).await {
        Ok(connection) => connection,
        Err(open_error) => {
            note_upstream_error(&state, &account, session_hash.as_deref(), &open_error).await;
            let (status, api_error) = error_parts(&open_error);
            return respond_error(wants_stream, status, api_error);
        }
    };

    let ctx = RequestContext {
        state,
        account,
        api_key_id,
        session_hash,
        model,
        rate_limits: connection.rate_limits,
    };

    if wants_stream {
        stream_response(ctx, tool_ids, connection.events)
    } else {
        collect_response(ctx, tool_ids, connection.events).await
    }
}

/// Transcode the upstream stream into client SSE frames.
///
/// The pump task owns the converter and the upstream stream; when the
/// client disconnects the send side closes, the task returns, and dropping
/// the upstream stream aborts the in-flight read.
fn stream_response(
    ctx: RequestContext,
    tool_ids: ToolCallIdMap,
    mut events: UpstreamEventStream,
) -> Response {
    let alias_model = ctx.state.config.alias_model.clone();
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    tokio::spawn(async move {
        let mut converter = StreamConverter::new(alias_model, tool_ids);
        loop {
            let item = tokio::select! {
                item = events.next() => item,
                () = tx.closed() => {
                    debug!("client disconnected, aborting upstream stream");
                    return;
                }
            };
            let Some(item) = item else { break };

            match item {
                Ok(event) => {
                    for frame in converter.handle_event(event) {
                        match Event::default().event(frame.event_name()).json_data(&frame) {
                            Ok(sse_event) => {
                                if tx.send(Ok(sse_event)).await.is_err() {
                                    debug!("client disconnected mid-frame");
                                    return;
                                }
                            }
                            Err(serialize_error) => {
                                error!("failed to serialize frame: {serialize_error}");
                            }
                        }
                    }
                    if converter.is_finished() {
                        break;
                    }
                }
                Err(stream_error) => {
                    warn!("upstream stream error: {stream_error}");
                    let frame = StreamFrame::Error {
                        error: ApiError::new(
                            "api_error",
                            sanitize_message(&stream_error.to_string()),
                        ),
                    };
                    if let Ok(sse_event) =
                        Event::default().event(frame.event_name()).json_data(&frame)
                    {
                        let _ = tx.send(Ok(sse_event)).await;
                    }
                    return;
                }
            }
        }

        if let Some(usage) = converter.final_usage() {
            finish_success(&ctx, usage).await;
        } else {
            // Partial frames already reached the client; just end the stream.
            warn!("upstream stream ended without response.completed");
        }
    });

    (sse_headers(), Sse::new(ReceiverStream::new(rx))).into_response()
}

/// Collect the terminal payload and answer with one JSON body.
async fn collect_response(
    ctx: RequestContext,
    tool_ids: ToolCallIdMap,
    events: UpstreamEventStream,
) -> Response {
    match collect_completed(events).await {
        Ok(response) => {
            let message = response_to_message(&response, &tool_ids, &ctx.state.config.alias_model);
            finish_success(&ctx, message.usage).await;
            Json(message).into_response()
        }
        Err(collect_error) => {
            note_upstream_error(
                &ctx.state,
                &ctx.account,
                ctx.session_hash.as_deref(),
                &collect_error,
            )
            .await;
            let (status, api_error) = error_parts(&collect_error);
            json_error(status, api_error)
        }
    }
}

/// Post-success bookkeeping: usage to the sink, telemetry counters, and
/// clearing a stale rate-limit mark on the account that just served.
async fn finish_success(ctx: &RequestContext, usage: MessagesUsage) {
    let tally = UsageTally {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_creation_tokens: usage.cache_creation_input_tokens,
        cache_read_tokens: usage.cache_read_input_tokens,
    };
    let record = UsageRecord {
        api_key_id: ctx.api_key_id.clone(),
        usage: tally,
        model: ctx.model.clone(),
        account_id: ctx.account.account_id.clone(),
        account_type: ctx.account.account_type,
    };
    ctx.state.sink.record_usage(&record).await;

    if !ctx.rate_limits.is_empty() {
        ctx.state
            .sink
            .update_counters(
                &ctx.rate_limits,
                &tally,
                &ctx.model,
                &ctx.api_key_id,
                ctx.account.account_type,
            )
            .await;
    }

    if ctx
        .state
        .scheduler
        .is_rate_limited(&ctx.account.account_id)
        .await
    {
        ctx.state
            .scheduler
            .clear_rate_limit(&ctx.account.account_id, ctx.account.account_type)
            .await;
    }
}

/// Tell the scheduler about rate-limit and auth failures.
async fn note_upstream_error(
    state: &AppState,
    account: &SelectedAccount,
    session_hash: Option<&str>,
    upstream_error: &BridgeError,
) {
    match upstream_error {
        BridgeError::RateLimited {
            resets_in_seconds, ..
        } => {
            state
                .scheduler
                .mark_rate_limited(
                    &account.account_id,
                    account.account_type,
                    session_hash,
                    *resets_in_seconds,
                )
                .await;
        }
        BridgeError::Unauthorized(reason) => {
            state
                .scheduler
                .mark_unauthorized(
                    &account.account_id,
                    account.account_type,
                    session_hash,
                    reason,
                )
                .await;
        }
        _ => {}
    }
}

/// Map a bridge error to HTTP status plus client-facing detail.
fn error_parts(upstream_error: &BridgeError) -> (StatusCode, ApiError) {
    match upstream_error {
        BridgeError::RateLimited { message, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            ApiError::new("rate_limit_error", message.clone()),
        ),
        BridgeError::Unauthorized(message) => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("authentication_error", message.clone()),
        ),
        BridgeError::UpstreamStatus { status, message } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::new("api_error", message.clone()),
        ),
        BridgeError::Network(network_error) if network_error.is_timeout() => (
            StatusCode::GATEWAY_TIMEOUT,
            ApiError::new("api_error", "upstream timeout"),
        ),
        BridgeError::Network(_) => (
            StatusCode::BAD_GATEWAY,
            ApiError::new("api_error", "upstream connection error"),
        ),
        BridgeError::StreamEndedEarly => (
            StatusCode::BAD_GATEWAY,
            ApiError::new("api_error", upstream_error.to_string()),
        ),
        BridgeError::Stream(_) | BridgeError::Serialization(_) => (
            StatusCode::BAD_GATEWAY,
            ApiError::new("api_error", sanitize_message(&upstream_error.to_string())),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("api_error", sanitize_message(&upstream_error.to_string())),
        ),
    }
}

/// Emit an error in the framing the client asked for.
fn respond_error(wants_stream: bool, status: StatusCode, api_error: ApiError) -> Response {
    if wants_stream {
        sse_error(status, api_error)
    } else {
        json_error(status, api_error)
    }
}

fn json_error(status: StatusCode, api_error: ApiError) -> Response {
    (status, Json(ErrorBody { error: api_error })).into_response()
}

/// A one-event SSE response carrying an error frame.
fn sse_error(status: StatusCode, api_error: ApiError) -> Response {
    let frame = StreamFrame::Error { error: api_error };
    let event = Event::default()
        .event(frame.event_name())
        .json_data(&frame)
        .unwrap_or_else(|_| Event::default().event("error").data("{}"));

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(event) });
    let mut response = (sse_headers(), Sse::new(stream)).into_response();
    *response.status_mut() = status;
    response
}

fn sse_headers() -> [(HeaderName, &'static str); 4] {
    [
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ]
}
