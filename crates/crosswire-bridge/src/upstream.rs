//! Upstream connection handling.
//!
//! Opens the Responses endpoint as an SSE stream, classifies non-success
//! statuses into [`BridgeError`]s (draining error bodies under a hard cap),
//! and snapshots the upstream's rate-limit headers.

use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use secrecy::ExposeSecret;
use serde_json::Value;

use crosswire_common::account::{AccountType, SelectedAccount};
use crosswire_common::responses::{UpstreamErrorBody, UpstreamEvent};
use crosswire_common::usage::RateLimitSnapshot;

use crate::error::{BridgeError, sanitize_message};

/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Hard cap on draining an error response body.
const ERROR_DRAIN_CAP: Duration = Duration::from_secs(5);

/// A parsed upstream event stream.
pub type UpstreamEventStream =
    Pin<Box<dyn Stream<Item = Result<UpstreamEvent, BridgeError>> + Send>>;

/// An open upstream stream plus the rate-limit telemetry its response
/// headers carried.
pub struct UpstreamConnection {
    /// Parsed `response.*` events.
    pub events: UpstreamEventStream,
    /// Snapshot of the `x-codex-*` rate-limit headers.
    pub rate_limits: RateLimitSnapshot,
}

impl std::fmt::Debug for UpstreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnection")
            .field("events", &"<stream>")
            .field("rate_limits", &self.rate_limits)
            .finish()
    }
}

/// Client for the upstream Responses endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed or the base
    /// URL does not parse.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let base_url = base_url.into();
        reqwest::Url::parse(&base_url).map_err(|e| {
            BridgeError::Configuration(format!("Invalid upstream base URL '{base_url}': {e}"))
        })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Open the upstream as an SSE stream.
    ///
    /// The outbound body must already be prepared with
    /// [`prepare_outbound`]; the upstream only streams, so `stream=true` is
    /// mandatory regardless of what the client asked for.
    ///
    /// # Errors
    ///
    /// Non-success statuses are classified: 429 becomes
    /// [`BridgeError::RateLimited`] with any reset hint from the body,
    /// 401/402 become [`BridgeError::Unauthorized`], and anything else
    /// surfaces as [`BridgeError::UpstreamStatus`].
    pub async fn open(
        &self,
        body: &Value,
        account: &SelectedAccount,
    ) -> Result<UpstreamConnection, BridgeError> {
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        debug!("opening upstream stream at {url}");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .bearer_auth(account.token.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error_response(status, response).await);
        }

        let rate_limits = rate_limit_snapshot(response.headers());

        let events = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| {
                std::future::ready(match item {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            None
                        } else {
                            match serde_json::from_str::<UpstreamEvent>(&event.data) {
                                Ok(parsed) => Some(Ok(parsed)),
                                Err(error) => {
                                    warn!("skipping unparseable upstream event: {error}");
                                    debug!("problematic event data: {}", event.data);
                                    None
                                }
                            }
                        }
                    }
                    Err(error) => Some(Err(BridgeError::Stream(error.to_string()))),
                })
            })
            .boxed();

        Ok(UpstreamConnection {
            events,
            rate_limits,
        })
    }
}

/// Force the invariants every outbound body must satisfy: the upstream is
/// stream-only, and OAuth-style accounts must not have responses stored.
pub fn prepare_outbound(body: &mut Value, account_type: AccountType) {
    if let Some(object) = body.as_object_mut() {
        object.insert("stream".to_string(), Value::from(true));
        if account_type == AccountType::Oauth {
            object.insert("store".to_string(), Value::from(false));
        }
    }
}

/// Drain (capped) and classify a non-success upstream response.
async fn classify_error_response(status: StatusCode, response: reqwest::Response) -> BridgeError {
    let body = match tokio::time::timeout(ERROR_DRAIN_CAP, response.text()).await {
        Ok(Ok(text)) => text,
        Ok(Err(error)) => {
            warn!("failed to read upstream error body: {error}");
            String::new()
        }
        Err(_) => {
            warn!(
                "upstream error body drain exceeded {}s cap",
                ERROR_DRAIN_CAP.as_secs()
            );
            String::new()
        }
    };

    let parsed = serde_json::from_str::<UpstreamErrorBody>(&body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.clone()
            }
        });
    let message = sanitize_message(&message);

    match status.as_u16() {
        429 => BridgeError::RateLimited {
            message,
            resets_in_seconds: parsed.and_then(|b| b.error.resets_in_seconds),
        },
        401 | 402 => BridgeError::Unauthorized(message),
        code => BridgeError::UpstreamStatus {
            status: code,
            message,
        },
    }
}

/// Parse the upstream's rate-limit headers into a snapshot.
///
/// A slot is filled only when the header is present and numeric.
#[must_use]
pub fn rate_limit_snapshot(headers: &HeaderMap) -> RateLimitSnapshot {
    fn float(headers: &HeaderMap, name: &str) -> Option<f64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }
    fn integer(headers: &HeaderMap, name: &str) -> Option<u64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    RateLimitSnapshot {
        primary_used_percent: float(headers, "x-codex-primary-used-percent"),
        primary_reset_after_seconds: integer(headers, "x-codex-primary-reset-after-seconds"),
        primary_window_minutes: integer(headers, "x-codex-primary-window-minutes"),
        secondary_used_percent: float(headers, "x-codex-secondary-used-percent"),
        secondary_reset_after_seconds: integer(headers, "x-codex-secondary-reset-after-seconds"),
        secondary_window_minutes: integer(headers, "x-codex-secondary-window-minutes"),
        primary_over_secondary_limit_percent: float(
            headers,
            "x-codex-primary-over-secondary-limit-percent",
        ),
    }
}
