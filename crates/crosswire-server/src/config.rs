//! Server configuration.
//!
//! Configuration is loaded from a TOML file whose path comes from the
//! `CROSSWIRE_CONFIG` environment variable or the first CLI argument.
//!
//! ## Example Configuration
//!
//! ```toml
//! listen_addr = "127.0.0.1:8317"
//! upstream_base_url = "https://chatgpt.com/backend-api/codex"
//! alias_model = "claude-sonnet-4-5-20250929"
//! default_instructions = "You are a coding agent."
//!
//! [adapter.instructions]
//! mode = "prepend"
//! apply_when = "non_codex"
//!
//! [[accounts]]
//! id = "acct-main"
//! account_type = "oauth"
//! token = "..."
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crosswire_common::account::AccountType;
use crosswire_common::adapter::AdapterConfig;

use crate::error::{Result, ServerError};

/// Server configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the upstream Responses endpoint.
    pub upstream_base_url: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Model name reported back to clients.
    ///
    /// A fixed alias rather than the upstream model: downstream consumers
    /// use it to look up context-window sizes in their own registries.
    #[serde(default = "default_alias_model")]
    pub alias_model: String,

    /// Instruction text the adapter uses when its config carries none.
    #[serde(default)]
    pub default_instructions: String,

    /// Outbound body adapter settings.
    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Upstream accounts.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// One upstream account entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account identifier used in scheduling and metrics.
    pub id: String,

    /// Credential kind; OAuth accounts get `store=false` forced upstream.
    #[serde(default = "default_account_type")]
    pub account_type: AccountType,

    /// Bearer token for the upstream.
    pub token: String,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The upstream base URL is empty
    /// - No accounts are defined
    /// - Duplicate account ids are found
    pub fn validate(&self) -> Result<()> {
        if self.upstream_base_url.trim().is_empty() {
            return Err(ServerError::Config(
                "upstream_base_url must not be empty".to_string(),
            ));
        }

        if self.accounts.is_empty() {
            return Err(ServerError::Config(
                "No accounts defined in configuration".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for account in &self.accounts {
            if !seen.insert(&account.id) {
                return Err(ServerError::Config(format!(
                    "Duplicate account id '{}'",
                    account.id
                )));
            }
        }

        Ok(())
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8317".to_string()
}

const fn default_timeout_seconds() -> u64 {
    600
}

fn default_alias_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

const fn default_account_type() -> AccountType {
    AccountType::ApiKey
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sample_config_toml() -> &'static str {
        r#"
upstream_base_url = "https://upstream.example/v1"
default_instructions = "You are a coding agent."

[adapter.instructions]
mode = "prepend"
apply_when = "all"

[[accounts]]
id = "acct-main"
account_type = "oauth"
token = "tok-1"

[[accounts]]
id = "acct-backup"
token = "tok-2"
        "#
    }

    #[test]
    fn test_parse_config() {
        let config: ServerConfig = toml::from_str(sample_config_toml()).unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8317");
        assert_eq!(config.timeout_seconds, 600);
        assert_eq!(config.alias_model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].account_type, AccountType::Oauth);
        assert_eq!(config.accounts[1].account_type, AccountType::ApiKey);
        assert_eq!(
            config.adapter.instructions.mode,
            crosswire_common::adapter::InstructionMode::Prepend
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_accounts() {
        let toml = r#"upstream_base_url = "https://upstream.example/v1""#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_account_ids() {
        let toml = r#"
upstream_base_url = "https://upstream.example/v1"

[[accounts]]
id = "acct"
token = "a"

[[accounts]]
id = "acct"
token = "b"
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, sample_config_toml()).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.accounts[0].id, "acct-main");

        assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_unknown_adapter_enums_fall_back() {
        let toml = r#"
upstream_base_url = "https://upstream.example/v1"

[adapter.instructions]
mode = "merge"
apply_when = "whenever"

[[accounts]]
id = "acct"
token = "a"
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.adapter.instructions.mode,
            crosswire_common::adapter::InstructionMode::Overwrite
        );
        assert_eq!(
            config.adapter.instructions.apply_when,
            crosswire_common::adapter::InstructionScope::NonCodex
        );
    }
}
