//! Metrics sink seam.
//!
//! Usage tallies and upstream rate-limit telemetry leave the core through
//! [`MetricsSink`]. The bundled in-memory implementation keeps process-wide
//! totals; persistence belongs to real deployments.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crosswire_common::account::AccountType;
use crosswire_common::usage::{RateLimitSnapshot, UsageTally};

/// One request's worth of usage, attributed to key and account.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// API key the client authenticated with.
    pub api_key_id: String,
    /// Token tallies.
    pub usage: UsageTally,
    /// Model the client requested (post vendor-prefix split).
    pub model: String,
    /// Account that served the request.
    pub account_id: String,
    /// Credential kind of that account.
    pub account_type: AccountType,
}

/// Where usage tallies and rate-limit telemetry go.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record a completed request's token usage.
    async fn record_usage(&self, record: &UsageRecord);

    /// Update rolling counters with the upstream's rate-limit snapshot.
    async fn update_counters(
        &self,
        snapshot: &RateLimitSnapshot,
        usage: &UsageTally,
        model: &str,
        api_key_id: &str,
        account_type: AccountType,
    );
}

/// Process-local sink with atomic totals.
#[derive(Debug, Default)]
pub struct InMemorySink {
    requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cache_read_tokens: AtomicU64,
    last_snapshot: Mutex<Option<RateLimitSnapshot>>,
}

impl InMemorySink {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals recorded so far: (requests, input, output, `cache_read`).
    #[must_use]
    pub fn totals(&self) -> (u64, u64, u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
            self.cache_read_tokens.load(Ordering::Relaxed),
        )
    }

    /// The most recent rate-limit snapshot, if any arrived.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<RateLimitSnapshot> {
        self.last_snapshot.lock().ok().and_then(|guard| *guard)
    }
}

#[async_trait]
impl MetricsSink for InMemorySink {
    async fn record_usage(&self, record: &UsageRecord) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(record.usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(record.usage.output_tokens, Ordering::Relaxed);
        self.cache_read_tokens
            .fetch_add(record.usage.cache_read_tokens, Ordering::Relaxed);
        debug!(
            api_key_id = %record.api_key_id,
            account_id = %record.account_id,
            model = %record.model,
            input_tokens = record.usage.input_tokens,
            output_tokens = record.usage.output_tokens,
            "usage recorded"
        );
    }

    async fn update_counters(
        &self,
        snapshot: &RateLimitSnapshot,
        _usage: &UsageTally,
        model: &str,
        api_key_id: &str,
        _account_type: AccountType,
    ) {
        debug!(
            api_key_id = %api_key_id,
            model = %model,
            primary_used = ?snapshot.primary_used_percent,
            "rate limit counters updated"
        );
        if let Ok(mut guard) = self.last_snapshot.lock() {
            *guard = Some(*snapshot);
        }
    }
}
