//! Tool-call identifier mapping and minting.
//!
//! Client-side tool identifiers (`toolu_*` or arbitrary strings) and
//! upstream identifiers (`call_*`) live in disjoint namespaces. Each request
//! owns one [`ToolCallIdMap`]: the request translator fills it while
//! linearizing assistant turns, and the response path consults it (forward
//! for `tool_result` turns, reverse for upstream `function_call` items).

use std::collections::HashMap;

use uuid::Uuid;

/// Mint an upstream-namespace call identifier: `call_` + 24 hex chars.
#[must_use]
pub fn mint_call_id() -> String {
    format!("call_{}", random_hex(24))
}

/// Mint a client-namespace tool-use identifier: `toolu_` + 24 hex chars.
#[must_use]
pub fn mint_tool_use_id() -> String {
    format!("toolu_{}", random_hex(24))
}

/// Mint a message identifier: `msg_` + 32 hex chars.
#[must_use]
pub fn mint_message_id() -> String {
    format!("msg_{}", random_hex(32))
}

/// Random lowercase hex of the given width, at most 32 chars per draw.
fn random_hex(width: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(width);
    hex
}

/// Per-request map from client tool identifiers to upstream call identifiers.
///
/// Ephemeral: created by the request translator, read by the response
/// translator, dropped with the request. Reverse lookup is a linear scan,
/// which is fine for the few dozen entries a conversation can hold.
#[derive(Debug, Clone, Default)]
pub struct ToolCallIdMap {
    forward: HashMap<String, String>,
}

impl ToolCallIdMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `client_id -> call_id`.
    pub fn insert(&mut self, client_id: impl Into<String>, call_id: impl Into<String>) {
        self.forward.insert(client_id.into(), call_id.into());
    }

    /// Upstream call identifier for a client identifier, if mapped.
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&str> {
        self.forward.get(client_id).map(String::as_str)
    }

    /// Client identifier for an upstream call identifier, if mapped.
    #[must_use]
    pub fn reverse(&self, call_id: &str) -> Option<&str> {
        self.forward
            .iter()
            .find(|(_, mapped)| mapped.as_str() == call_id)
            .map(|(client_id, _)| client_id.as_str())
    }

    /// Client identifier for an upstream call identifier, minting a fresh
    /// `toolu_` identifier when no mapping exists.
    #[must_use]
    pub fn reverse_or_mint(&self, call_id: &str) -> String {
        self.reverse(call_id)
            .map_or_else(mint_tool_use_id, ToString::to_string)
    }

    /// Number of recorded mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn minted_ids_have_expected_shapes() {
        let call = mint_call_id();
        assert!(call.starts_with("call_"));
        assert_eq!(call.len(), "call_".len() + 24);
        assert!(call["call_".len()..].chars().all(|c| c.is_ascii_hexdigit()));

        let tool = mint_tool_use_id();
        assert!(tool.starts_with("toolu_"));
        assert_eq!(tool.len(), "toolu_".len() + 24);

        let msg = mint_message_id();
        assert!(msg.starts_with("msg_"));
        assert_eq!(msg.len(), "msg_".len() + 32);
    }

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(mint_call_id(), mint_call_id());
    }

    #[test]
    fn forward_and_reverse_lookups_agree() {
        let mut map = ToolCallIdMap::new();
        map.insert("toolu_abc", "call_123");
        map.insert("toolu_def", "call_456");

        assert_eq!(map.get("toolu_abc"), Some("call_123"));
        assert_eq!(map.reverse("call_456"), Some("toolu_def"));
        assert_eq!(map.reverse("call_999"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn reverse_or_mint_falls_back_to_fresh_tool_use_id() {
        let map = ToolCallIdMap::new();
        let minted = map.reverse_or_mint("call_unseen");
        assert!(minted.starts_with("toolu_"));

        let mut map = ToolCallIdMap::new();
        map.insert("toolu_known", "call_known");
        assert_eq!(map.reverse_or_mint("call_known"), "toolu_known");
    }
}
