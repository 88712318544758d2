//! Usage tallies and upstream rate-limit telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token tallies handed to the metrics sink after a successful request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTally {
    /// Net input tokens (upstream input minus cache reads).
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Cache-creation tokens; always zero, the upstream does not report them.
    pub cache_creation_tokens: u64,
    /// Cache-read tokens.
    pub cache_read_tokens: u64,
}

/// Snapshot of the upstream's rate-limit headers.
///
/// All slots are optional: a field is populated only when the matching
/// header was present and numeric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// `x-codex-primary-used-percent`.
    pub primary_used_percent: Option<f64>,
    /// `x-codex-primary-reset-after-seconds`.
    pub primary_reset_after_seconds: Option<u64>,
    /// `x-codex-primary-window-minutes`.
    pub primary_window_minutes: Option<u64>,
    /// `x-codex-secondary-used-percent`.
    pub secondary_used_percent: Option<f64>,
    /// `x-codex-secondary-reset-after-seconds`.
    pub secondary_reset_after_seconds: Option<u64>,
    /// `x-codex-secondary-window-minutes`.
    pub secondary_window_minutes: Option<u64>,
    /// `x-codex-primary-over-secondary-limit-percent`.
    pub primary_over_secondary_limit_percent: Option<f64>,
}

impl RateLimitSnapshot {
    /// Whether no header carried a value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.primary_used_percent.is_none()
            && self.primary_reset_after_seconds.is_none()
            && self.primary_window_minutes.is_none()
            && self.secondary_used_percent.is_none()
            && self.secondary_reset_after_seconds.is_none()
            && self.secondary_window_minutes.is_none()
            && self.primary_over_secondary_limit_percent.is_none()
    }
}

/// Rate-limit state the scheduler keeps per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitMark {
    /// When the mark was placed.
    pub marked_at: DateTime<Utc>,
    /// When the upstream said the window resets, if it said.
    pub resets_at: Option<DateTime<Utc>>,
}
