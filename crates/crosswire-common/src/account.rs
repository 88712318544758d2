//! Account selection types shared between the scheduler seam and the
//! upstream client.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Kind of upstream credential an account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// OAuth-style account; responses must not be stored upstream.
    Oauth,
    /// Plain API key account.
    ApiKey,
}

/// An account picked by the scheduler for one request.
#[derive(Clone)]
pub struct SelectedAccount {
    /// Scheduler-assigned account identifier.
    pub account_id: String,
    /// Credential kind.
    pub account_type: AccountType,
    /// Bearer token for the upstream.
    pub token: SecretString,
}

impl std::fmt::Debug for SelectedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedAccount")
            .field("account_id", &self.account_id)
            .field("account_type", &self.account_type)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_token() {
        let account = SelectedAccount {
            account_id: "acct_1".to_string(),
            account_type: AccountType::Oauth,
            token: SecretString::from("sk-very-secret"),
        };
        let printed = format!("{account:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("sk-very-secret"));
    }
}
