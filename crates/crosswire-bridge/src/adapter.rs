//! Outbound request-body adaptation.
//!
//! After translation the outbound body may still carry fields the upstream
//! rejects, and deployments can inject server-side instruction text. Both
//! rewrites are scoped by client identity: the codex CLI family manages its
//! own instructions and parameters, so stripping never applies to it and
//! injection only does when explicitly widened to `all`.

use log::debug;
use serde_json::Value;

use crosswire_common::adapter::{AdapterConfig, InstructionMode, InstructionScope};

/// Per-request adaptation inputs.
#[derive(Debug, Clone, Copy)]
pub struct AdaptContext<'a> {
    /// Whether the client is a recognized codex CLI.
    pub is_cli: bool,
    /// Adapter configuration.
    pub config: &'a AdapterConfig,
    /// Instruction text used when the config does not carry its own.
    pub default_text: &'a str,
}

/// Result of adapting a body.
#[derive(Debug, Clone)]
pub struct AdaptOutcome {
    /// The adapted body; always a copy, the input is never mutated.
    pub body: Value,
    /// True iff a field was stripped or the instruction value was rewritten.
    pub applied: bool,
    /// What changed, for logging.
    pub changes: AdaptChanges,
}

/// Record of the rewrites an adaptation performed.
#[derive(Debug, Clone, Default)]
pub struct AdaptChanges {
    /// Names of removed fields, in configured order.
    pub stripped_fields: Vec<String>,
    /// Instruction annotation, when instruction handling ran.
    pub instructions: Option<InstructionChange>,
}

/// Annotation describing how instruction text was handled.
#[derive(Debug, Clone, Default)]
pub struct InstructionChange {
    /// The mode that ran.
    pub mode: InstructionMode,
    /// Prepend found the server text already in place and left the body alone.
    pub already_present: bool,
    /// Prepend found no client text and used the server text bare.
    pub client_missing: bool,
    /// `none` mode backfilled a blank client value.
    pub fallback: bool,
}

/// Adapt an outbound body according to config and client identity.
///
/// Never fails; anything unexpected degrades to passthrough.
#[must_use]
pub fn adapt(body: &Value, ctx: &AdaptContext<'_>) -> AdaptOutcome {
    let Some(object) = body.as_object() else {
        return passthrough(body);
    };

    if !ctx.config.enabled {
        return passthrough(body);
    }

    let mut object = object.clone();
    let mut changes = AdaptChanges::default();
    let mut modified = false;

    if !ctx.is_cli && ctx.config.strip_fields.enabled {
        for field in &ctx.config.strip_fields.fields {
            if object.remove(field).is_some() {
                changes.stripped_fields.push(field.clone());
                modified = true;
            }
        }
    }

    let instructions = &ctx.config.instructions;
    let scope_allows = instructions.apply_when == InstructionScope::All || !ctx.is_cli;
    let server_text = instructions
        .text
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(ctx.default_text);

    if scope_allows && !server_text.trim().is_empty() {
        let client_text = object
            .get("instructions")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let client_blank = client_text.trim().is_empty();

        match instructions.mode {
            InstructionMode::Overwrite => {
                object.insert("instructions".to_string(), Value::from(server_text));
                changes.instructions = Some(InstructionChange {
                    mode: InstructionMode::Overwrite,
                    ..InstructionChange::default()
                });
                modified = true;
            }
            InstructionMode::Prepend => {
                if !client_blank
                    && (client_text.starts_with(server_text)
                        || client_text.trim_start().starts_with(server_text))
                {
                    changes.instructions = Some(InstructionChange {
                        mode: InstructionMode::Prepend,
                        already_present: true,
                        ..InstructionChange::default()
                    });
                } else if client_blank {
                    object.insert("instructions".to_string(), Value::from(server_text));
                    changes.instructions = Some(InstructionChange {
                        mode: InstructionMode::Prepend,
                        client_missing: true,
                        ..InstructionChange::default()
                    });
                    modified = true;
                } else {
                    let combined = format!("{server_text}\n\n{client_text}");
                    object.insert("instructions".to_string(), Value::from(combined));
                    changes.instructions = Some(InstructionChange {
                        mode: InstructionMode::Prepend,
                        ..InstructionChange::default()
                    });
                    modified = true;
                }
            }
            InstructionMode::None => {
                // The upstream rejects blank instructions, so `none` still
                // backfills an empty client value.
                if client_blank {
                    object.insert("instructions".to_string(), Value::from(server_text));
                    changes.instructions = Some(InstructionChange {
                        mode: InstructionMode::None,
                        fallback: true,
                        ..InstructionChange::default()
                    });
                    modified = true;
                }
            }
        }
    }

    if modified {
        debug!(
            "adapted outbound body: stripped {:?}, instructions {:?}",
            changes.stripped_fields, changes.instructions
        );
    }

    AdaptOutcome {
        body: Value::Object(object),
        applied: modified,
        changes,
    }
}

fn passthrough(body: &Value) -> AdaptOutcome {
    AdaptOutcome {
        body: body.clone(),
        applied: false,
        changes: AdaptChanges::default(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crosswire_common::adapter::{InstructionsConfig, StripFieldsConfig};
    use serde_json::json;

    fn config(mode: InstructionMode, apply_when: InstructionScope, text: &str) -> AdapterConfig {
        AdapterConfig {
            enabled: true,
            instructions: InstructionsConfig {
                mode,
                apply_when,
                text: Some(text.to_string()),
            },
            strip_fields: StripFieldsConfig::default(),
        }
    }

    fn ctx<'a>(is_cli: bool, config: &'a AdapterConfig) -> AdaptContext<'a> {
        AdaptContext {
            is_cli,
            config,
            default_text: "",
        }
    }

    #[test]
    fn overwrite_for_cli_client_with_all_scope_keeps_stripped_fields() {
        let config = config(InstructionMode::Overwrite, InstructionScope::All, "SERVER");
        let body = json!({"instructions": "CLIENT", "temperature": 1});

        let outcome = adapt(&body, &ctx(true, &config));

        assert_eq!(outcome.body["instructions"], "SERVER");
        assert_eq!(outcome.body["temperature"], 1);
        assert!(outcome.applied);
        assert!(outcome.changes.stripped_fields.is_empty());
        // Input body untouched.
        assert_eq!(body["instructions"], "CLIENT");
    }

    #[test]
    fn prepend_is_idempotent() {
        let config = config(
            InstructionMode::Prepend,
            InstructionScope::NonCodex,
            "SERVER",
        );
        let body = json!({"instructions": "CLIENT"});

        let first = adapt(&body, &ctx(false, &config));
        assert_eq!(first.body["instructions"], "SERVER\n\nCLIENT");
        assert!(first.applied);

        let second = adapt(&first.body, &ctx(false, &config));
        assert_eq!(second.body["instructions"], "SERVER\n\nCLIENT");
        let change = second.changes.instructions.unwrap();
        assert_eq!(change.mode, InstructionMode::Prepend);
        assert!(change.already_present);
        assert!(!second.applied);
    }

    #[test]
    fn prepend_with_blank_client_uses_server_text_bare() {
        let config = config(
            InstructionMode::Prepend,
            InstructionScope::NonCodex,
            "SERVER",
        );
        let outcome = adapt(&json!({"instructions": "  "}), &ctx(false, &config));
        assert_eq!(outcome.body["instructions"], "SERVER");
        assert!(outcome.changes.instructions.unwrap().client_missing);
    }

    #[test]
    fn none_mode_backfills_blank_instructions_only() {
        let config = config(InstructionMode::None, InstructionScope::NonCodex, "SERVER");

        let backfilled = adapt(&json!({}), &ctx(false, &config));
        assert_eq!(backfilled.body["instructions"], "SERVER");
        assert!(backfilled.changes.instructions.unwrap().fallback);
        assert!(backfilled.applied);

        let untouched = adapt(&json!({"instructions": "CLIENT"}), &ctx(false, &config));
        assert_eq!(untouched.body["instructions"], "CLIENT");
        assert!(untouched.changes.instructions.is_none());
        assert!(!untouched.applied);
    }

    #[test]
    fn strip_fields_fire_only_for_non_cli_clients() {
        let config = AdapterConfig::default();
        let body = json!({"instructions": "x", "temperature": 0.5, "top_p": 0.9, "user": "u"});

        let cli = adapt(&body, &ctx(true, &config));
        assert_eq!(cli.body["temperature"], 0.5);
        assert!(cli.changes.stripped_fields.is_empty());

        let other = adapt(&body, &ctx(false, &config));
        assert!(other.body.get("temperature").is_none());
        assert!(other.body.get("top_p").is_none());
        assert!(other.body.get("user").is_none());
        assert_eq!(
            other.changes.stripped_fields,
            vec!["temperature", "top_p", "user"]
        );
        assert!(other.applied);
    }

    #[test]
    fn cli_with_non_codex_scope_is_fully_untouched() {
        let config = config(
            InstructionMode::Overwrite,
            InstructionScope::NonCodex,
            "SERVER",
        );
        let body = json!({"instructions": "CLIENT", "temperature": 1});

        let outcome = adapt(&body, &ctx(true, &config));
        assert_eq!(outcome.body, body);
        assert!(!outcome.applied);
    }

    #[test]
    fn disabled_config_and_non_object_bodies_pass_through() {
        let disabled = AdapterConfig::disabled();
        let body = json!({"instructions": "CLIENT"});
        let outcome = adapt(&body, &ctx(false, &disabled));
        assert_eq!(outcome.body, body);
        assert!(!outcome.applied);

        let config = AdapterConfig::default();
        let scalar = json!("not an object");
        let outcome = adapt(&scalar, &ctx(false, &config));
        assert_eq!(outcome.body, scalar);
        assert!(!outcome.applied);
    }

    #[test]
    fn config_text_falls_back_to_caller_default() {
        let config = AdapterConfig {
            enabled: true,
            instructions: InstructionsConfig {
                mode: InstructionMode::Overwrite,
                apply_when: InstructionScope::NonCodex,
                text: None,
            },
            strip_fields: StripFieldsConfig {
                enabled: false,
                fields: Vec::new(),
            },
        };
        let ctx = AdaptContext {
            is_cli: false,
            config: &config,
            default_text: "DEFAULT",
        };

        let outcome = adapt(&json!({}), &ctx);
        assert_eq!(outcome.body["instructions"], "DEFAULT");
    }
}
