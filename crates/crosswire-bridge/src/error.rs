//! Error types for the bridge core.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Errors that can occur while translating a request or relaying a stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// Network or HTTP request failure.
    ///
    /// Connection failures, DNS errors, and the configured request timeout
    /// all land here.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream rate limit (HTTP 429).
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Message from the upstream error body, best effort.
        message: String,
        /// Seconds until the window resets, if the upstream said.
        resets_in_seconds: Option<u64>,
    },

    /// Upstream rejected the credential (HTTP 401/402).
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Any other non-success upstream status.
    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// Message from the upstream body, best effort.
        message: String,
    },

    /// The SSE transport broke mid-stream.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The upstream stream ended without a terminal response event.
    #[error("stream ended without response.completed")]
    StreamEndedEarly,

    /// Bad bridge-side configuration (base URL and the like).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    /// Check if this is a rate-limit error.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The reset hint of a rate-limit error, if any.
    #[must_use]
    pub const fn resets_in_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                resets_in_seconds, ..
            } => *resets_in_seconds,
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used)]
static BEARER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").unwrap());

#[allow(clippy::unwrap_used)]
static SECRET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9_-]{8,}").unwrap());

/// Strip credentials from a message before it reaches a client.
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    let message = BEARER_TOKEN.replace_all(message, "Bearer [REDACTED]");
    SECRET_KEY.replace_all(&message, "[REDACTED]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_bearer_tokens_and_keys() {
        let input = "auth failed for Bearer abc.DEF-123 using sk-1234567890abcdef";
        let clean = sanitize_message(input);
        assert!(!clean.contains("abc.DEF-123"));
        assert!(!clean.contains("sk-1234567890abcdef"));
        assert!(clean.contains("Bearer [REDACTED]"));
    }

    #[test]
    fn sanitize_leaves_plain_messages_alone() {
        assert_eq!(sanitize_message("slow down"), "slow down");
    }

    #[test]
    fn rate_limit_predicates() {
        let err = BridgeError::RateLimited {
            message: "slow down".to_string(),
            resets_in_seconds: Some(12),
        };
        assert!(err.is_rate_limit());
        assert!(!err.is_unauthorized());
        assert_eq!(err.resets_in_seconds(), Some(12));

        let err = BridgeError::Unauthorized("bad token".to_string());
        assert!(err.is_unauthorized());
        assert_eq!(err.resets_in_seconds(), None);
    }
}
