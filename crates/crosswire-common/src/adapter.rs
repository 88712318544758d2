//! Request-body adapter configuration.
//!
//! The adapter rewrites outbound Responses-dialect bodies: stripping fields
//! the upstream rejects and injecting server-side instruction text. Its
//! configuration is treated as possibly malformed - every slot validates
//! independently and unknown enum values collapse to a default instead of
//! erroring.

use serde::{Deserialize, Deserializer, Serialize};

/// Fields stripped from outbound bodies for non-CLI clients.
pub const DEFAULT_STRIP_FIELDS: &[&str] = &[
    "temperature",
    "top_p",
    "max_output_tokens",
    "user",
    "text_formatting",
    "truncation",
    "text",
    "service_tier",
    "prompt_cache_retention",
    "safety_identifier",
];

/// Adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Master switch; disabled means passthrough.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Instruction injection settings.
    #[serde(default)]
    pub instructions: InstructionsConfig,
    /// Field stripping settings.
    #[serde(default)]
    pub strip_fields: StripFieldsConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instructions: InstructionsConfig::default(),
            strip_fields: StripFieldsConfig::default(),
        }
    }
}

impl AdapterConfig {
    /// Configuration equivalent to "do nothing".
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Instruction injection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionsConfig {
    /// How server text combines with client text.
    #[serde(default)]
    pub mode: InstructionMode,
    /// Which clients are in scope.
    #[serde(default)]
    pub apply_when: InstructionScope,
    /// Server-side instruction text; falls back to a caller-supplied default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// How server instruction text combines with client instructions.
///
/// Unknown wire values normalize to [`InstructionMode::Overwrite`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionMode {
    /// Replace the client value unconditionally.
    #[default]
    Overwrite,
    /// Put server text in front of the client value.
    Prepend,
    /// Leave the client value alone, backfilling only when blank.
    None,
}

impl InstructionMode {
    /// Collapse a wire value to a known mode.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        match value {
            "prepend" => Self::Prepend,
            "none" => Self::None,
            _ => Self::Overwrite,
        }
    }
}

impl<'de> Deserialize<'de> for InstructionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::normalize(&value))
    }
}

/// Which clients instruction injection applies to.
///
/// Unknown wire values normalize to [`InstructionScope::NonCodex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionScope {
    /// Every client.
    All,
    /// Only clients that are not the codex CLI family.
    #[default]
    NonCodex,
}

impl InstructionScope {
    /// Collapse a wire value to a known scope.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        match value {
            "all" => Self::All,
            _ => Self::NonCodex,
        }
    }
}

impl<'de> Deserialize<'de> for InstructionScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::normalize(&value))
    }
}

/// Field stripping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripFieldsConfig {
    /// Whether stripping is active (non-CLI clients only).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Field names to remove, in order.
    #[serde(default = "default_strip_fields")]
    pub fields: Vec<String>,
}

impl Default for StripFieldsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: default_strip_fields(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_strip_fields() -> Vec<String> {
    DEFAULT_STRIP_FIELDS
        .iter()
        .map(ToString::to_string)
        .collect()
}
