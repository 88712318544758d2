//! Account scheduling seam.
//!
//! The bridge treats account state as a remote capability: selection,
//! rate-limit marks, and auth marks all go through [`Scheduler`]. The
//! bundled [`StaticScheduler`] serves config-listed accounts and keeps its
//! bookkeeping in process; deployments with real account services swap in
//! their own implementation.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use secrecy::SecretString;
use tracing::{info, warn};

use crosswire_common::account::{AccountType, SelectedAccount};
use crosswire_common::usage::RateLimitMark;

use crate::config::AccountConfig;
use crate::error::{Result, ServerError};

/// Account selection and health bookkeeping.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Pick an account for a request.
    ///
    /// # Errors
    ///
    /// Returns an error when no usable account exists.
    async fn select_account(
        &self,
        api_key_id: &str,
        session_hash: Option<&str>,
        requested_model: &str,
    ) -> Result<SelectedAccount>;

    /// Record that the upstream rate-limited an account.
    async fn mark_rate_limited(
        &self,
        account_id: &str,
        account_type: AccountType,
        session_hash: Option<&str>,
        resets_after_seconds: Option<u64>,
    );

    /// Record that the upstream rejected an account's credential.
    async fn mark_unauthorized(
        &self,
        account_id: &str,
        account_type: AccountType,
        session_hash: Option<&str>,
        reason: &str,
    );

    /// Whether an account currently has an active rate-limit mark.
    async fn is_rate_limited(&self, account_id: &str) -> bool;

    /// Clear an account's rate-limit mark.
    async fn clear_rate_limit(&self, account_id: &str, account_type: AccountType);
}

/// Config-driven in-process scheduler.
///
/// Accounts are served in configured order, skipping ones marked
/// unauthorized or inside an unexpired rate-limit window. Expired windows
/// are cleared lazily on the next lookup.
pub struct StaticScheduler {
    accounts: Vec<(String, AccountType, SecretString)>,
    rate_limited: DashMap<String, RateLimitMark>,
    unauthorized: DashMap<String, String>,
}

impl StaticScheduler {
    /// Build a scheduler over the configured account list.
    #[must_use]
    pub fn new(accounts: &[AccountConfig]) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|account| {
                    (
                        account.id.clone(),
                        account.account_type,
                        SecretString::from(account.token.clone()),
                    )
                })
                .collect(),
            rate_limited: DashMap::new(),
            unauthorized: DashMap::new(),
        }
    }

    fn mark_is_active(&self, account_id: &str) -> bool {
        let Some(mark) = self.rate_limited.get(account_id) else {
            return false;
        };
        match mark.resets_at {
            Some(resets_at) if resets_at <= Utc::now() => {
                drop(mark);
                self.rate_limited.remove(account_id);
                false
            }
            _ => true,
        }
    }
}

#[async_trait]
impl Scheduler for StaticScheduler {
    async fn select_account(
        &self,
        api_key_id: &str,
        session_hash: Option<&str>,
        requested_model: &str,
    ) -> Result<SelectedAccount> {
        for (id, account_type, token) in &self.accounts {
            if self.unauthorized.contains_key(id) || self.mark_is_active(id) {
                continue;
            }
            info!(
                account_id = %id,
                api_key_id = %api_key_id,
                session_hash = session_hash.unwrap_or("-"),
                model = %requested_model,
                "selected account"
            );
            return Ok(SelectedAccount {
                account_id: id.clone(),
                account_type: *account_type,
                token: token.clone(),
            });
        }
        Err(ServerError::NoAccount)
    }

    async fn mark_rate_limited(
        &self,
        account_id: &str,
        _account_type: AccountType,
        session_hash: Option<&str>,
        resets_after_seconds: Option<u64>,
    ) {
        let now = Utc::now();
        let resets_at = resets_after_seconds
            .and_then(|seconds| i64::try_from(seconds).ok())
            .map(|seconds| now + Duration::seconds(seconds));
        warn!(
            account_id = %account_id,
            session_hash = session_hash.unwrap_or("-"),
            resets_after_seconds = ?resets_after_seconds,
            "account rate limited"
        );
        self.rate_limited.insert(
            account_id.to_string(),
            RateLimitMark {
                marked_at: now,
                resets_at,
            },
        );
    }

    async fn mark_unauthorized(
        &self,
        account_id: &str,
        _account_type: AccountType,
        session_hash: Option<&str>,
        reason: &str,
    ) {
        warn!(
            account_id = %account_id,
            session_hash = session_hash.unwrap_or("-"),
            reason = %reason,
            "account unauthorized"
        );
        self.unauthorized
            .insert(account_id.to_string(), reason.to_string());
    }

    async fn is_rate_limited(&self, account_id: &str) -> bool {
        self.mark_is_active(account_id)
    }

    async fn clear_rate_limit(&self, account_id: &str, _account_type: AccountType) {
        if self.rate_limited.remove(account_id).is_some() {
            info!(account_id = %account_id, "rate limit cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn accounts() -> Vec<AccountConfig> {
        vec![
            AccountConfig {
                id: "primary".to_string(),
                account_type: AccountType::Oauth,
                token: "tok-1".to_string(),
            },
            AccountConfig {
                id: "backup".to_string(),
                account_type: AccountType::ApiKey,
                token: "tok-2".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn selects_accounts_in_configured_order() {
        let scheduler = StaticScheduler::new(&accounts());
        let selected = scheduler.select_account("key", None, "m").await.unwrap();
        assert_eq!(selected.account_id, "primary");
        assert_eq!(selected.account_type, AccountType::Oauth);
    }

    #[tokio::test]
    async fn rate_limited_accounts_are_skipped_until_cleared() {
        let scheduler = StaticScheduler::new(&accounts());
        scheduler
            .mark_rate_limited("primary", AccountType::Oauth, None, Some(3600))
            .await;

        assert!(scheduler.is_rate_limited("primary").await);
        let selected = scheduler.select_account("key", None, "m").await.unwrap();
        assert_eq!(selected.account_id, "backup");

        scheduler.clear_rate_limit("primary", AccountType::Oauth).await;
        assert!(!scheduler.is_rate_limited("primary").await);
        let selected = scheduler.select_account("key", None, "m").await.unwrap();
        assert_eq!(selected.account_id, "primary");
    }

    #[tokio::test]
    async fn expired_rate_limit_marks_clear_lazily() {
        let scheduler = StaticScheduler::new(&accounts());
        scheduler
            .mark_rate_limited("primary", AccountType::Oauth, None, Some(0))
            .await;

        assert!(!scheduler.is_rate_limited("primary").await);
        let selected = scheduler.select_account("key", None, "m").await.unwrap();
        assert_eq!(selected.account_id, "primary");
    }

    #[tokio::test]
    async fn rate_limit_without_reset_hint_persists() {
        let scheduler = StaticScheduler::new(&accounts());
        scheduler
            .mark_rate_limited("primary", AccountType::Oauth, None, None)
            .await;
        assert!(scheduler.is_rate_limited("primary").await);
    }

    #[tokio::test]
    async fn unauthorized_accounts_are_never_selected() {
        let scheduler = StaticScheduler::new(&accounts());
        scheduler
            .mark_unauthorized("primary", AccountType::Oauth, None, "revoked")
            .await;
        scheduler
            .mark_unauthorized("backup", AccountType::ApiKey, None, "revoked")
            .await;

        let error = scheduler.select_account("key", None, "m").await.unwrap_err();
        assert!(matches!(error, ServerError::NoAccount));
    }
}
