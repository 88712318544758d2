//! Responses-to-Messages response translation.
//!
//! Turns a terminal `response.completed` payload into a single
//! Messages-dialect assistant message. The streaming converter shares the
//! stop-reason and usage accounting defined here.

use log::debug;
use serde_json::json;

use crosswire_common::ids::{ToolCallIdMap, mint_message_id};
use crosswire_common::messages::{MessageResponse, MessagesUsage, ResponseBlock, StopReason};
use crosswire_common::responses::{
    IncompleteReason, OutputContentPart, OutputItem, ResponseStatus, ResponsesResponse,
    SummaryPart,
};

/// Derive the Messages-dialect stop reason from a terminal response.
///
/// A pending function call always wins; otherwise an incomplete response
/// that ran out of output tokens reports `max_tokens`.
#[must_use]
pub fn derive_stop_reason(response: &ResponsesResponse) -> StopReason {
    if response.has_function_call() {
        return StopReason::ToolUse;
    }
    if response.status == ResponseStatus::Incomplete
        && response
            .incomplete_details
            .as_ref()
            .is_some_and(|details| details.reason == IncompleteReason::MaxOutputTokens)
    {
        return StopReason::MaxTokens;
    }
    StopReason::EndTurn
}

/// Parse function-call arguments, wrapping unparseable text as `{"raw": ...}`.
#[must_use]
pub fn parse_tool_input(arguments: &str) -> serde_json::Value {
    serde_json::from_str(arguments).unwrap_or_else(|error| {
        debug!("tool arguments are not valid JSON ({error}); wrapping raw text");
        json!({ "raw": arguments })
    })
}

/// Translate a terminal response into a complete assistant message.
///
/// `alias_model` is reported as the message's model so downstream consumers
/// can look up context-window sizes in their own registries.
#[must_use]
pub fn response_to_message(
    response: &ResponsesResponse,
    tool_ids: &ToolCallIdMap,
    alias_model: &str,
) -> MessageResponse {
    let mut content = Vec::new();

    for item in &response.output {
        match item {
            OutputItem::Reasoning { summary } => {
                let thinking: String = summary
                    .iter()
                    .filter_map(|part| match part {
                        SummaryPart::SummaryText { text } => Some(text.as_str()),
                        SummaryPart::Unknown => None,
                    })
                    .collect();
                if !thinking.is_empty() {
                    content.push(ResponseBlock::Thinking { thinking });
                }
            }
            OutputItem::Message {
                content: parts, ..
            } => {
                for part in parts {
                    if let OutputContentPart::OutputText { text } = part {
                        content.push(ResponseBlock::Text { text: text.clone() });
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                content.push(ResponseBlock::ToolUse {
                    id: tool_ids.reverse_or_mint(call_id),
                    name: name.clone(),
                    input: parse_tool_input(arguments),
                });
            }
            OutputItem::Unknown => {}
        }
    }

    let usage = response
        .usage
        .as_ref()
        .map(MessagesUsage::from_upstream)
        .unwrap_or_default();

    MessageResponse {
        id: mint_message_id(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: alias_model.to_string(),
        stop_reason: Some(derive_stop_reason(response)),
        stop_sequence: None,
        usage,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crosswire_common::responses::{
        IncompleteDetails, InputTokensDetails, ResponsesUsage, UpstreamEvent,
    };

    fn terminal(raw: &str) -> ResponsesResponse {
        let UpstreamEvent::Completed { response } = serde_json::from_str(raw).unwrap() else {
            panic!("fixture must be a response.completed event");
        };
        response
    }

    #[test]
    fn walks_output_in_order() {
        let response = terminal(
            r#"{
                "type": "response.completed",
                "response": {
                    "id": "resp_1",
                    "status": "completed",
                    "output": [
                        {"type": "reasoning", "summary": [
                            {"type": "summary_text", "text": "think "},
                            {"type": "summary_text", "text": "harder"}
                        ]},
                        {"type": "message", "role": "assistant", "content": [
                            {"type": "output_text", "text": "Sure."}
                        ]},
                        {"type": "function_call", "call_id": "call_A", "name": "run",
                         "arguments": "{\"x\":1}"}
                    ],
                    "usage": {"input_tokens": 100, "output_tokens": 20,
                              "input_tokens_details": {"cached_tokens": 40}}
                }
            }"#,
        );

        let message = response_to_message(&response, &ToolCallIdMap::new(), "claude-sonnet-4-5");

        assert_eq!(message.model, "claude-sonnet-4-5");
        assert!(message.id.starts_with("msg_"));
        assert_eq!(message.id.len(), "msg_".len() + 32);
        assert_eq!(message.content.len(), 3);
        assert!(matches!(
            &message.content[0],
            ResponseBlock::Thinking { thinking } if thinking == "think harder"
        ));
        assert!(matches!(
            &message.content[1],
            ResponseBlock::Text { text } if text == "Sure."
        ));
        let ResponseBlock::ToolUse { id, name, input } = &message.content[2] else {
            panic!("expected tool_use block");
        };
        assert!(id.starts_with("toolu_"));
        assert_eq!(name, "run");
        assert_eq!(input, &serde_json::json!({"x": 1}));

        assert_eq!(message.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(message.usage.input_tokens, 60);
        assert_eq!(message.usage.cache_read_input_tokens, 40);
        assert_eq!(message.usage.cache_creation_input_tokens, 0);
    }

    #[test]
    fn reverse_maps_known_call_ids() {
        let mut tool_ids = ToolCallIdMap::new();
        tool_ids.insert("toolu_client", "call_A");

        let response = terminal(
            r#"{
                "type": "response.completed",
                "response": {
                    "status": "completed",
                    "output": [
                        {"type": "function_call", "call_id": "call_A", "name": "run",
                         "arguments": "{}"}
                    ]
                }
            }"#,
        );

        let message = response_to_message(&response, &tool_ids, "alias");
        let ResponseBlock::ToolUse { id, .. } = &message.content[0] else {
            panic!("expected tool_use block");
        };
        assert_eq!(id, "toolu_client");
    }

    #[test]
    fn unparseable_arguments_fall_back_to_raw() {
        assert_eq!(
            parse_tool_input("not json"),
            serde_json::json!({"raw": "not json"})
        );
        assert_eq!(parse_tool_input("{}"), serde_json::json!({}));
    }

    #[test]
    fn stop_reason_precedence() {
        // Completed with no calls.
        let response = ResponsesResponse {
            status: ResponseStatus::Completed,
            ..Default::default()
        };
        assert_eq!(derive_stop_reason(&response), StopReason::EndTurn);

        // Incomplete for token budget.
        let response = ResponsesResponse {
            status: ResponseStatus::Incomplete,
            incomplete_details: Some(IncompleteDetails {
                reason: IncompleteReason::MaxOutputTokens,
            }),
            ..Default::default()
        };
        assert_eq!(derive_stop_reason(&response), StopReason::MaxTokens);

        // Incomplete for another reason stays end_turn.
        let response = ResponsesResponse {
            status: ResponseStatus::Incomplete,
            incomplete_details: Some(IncompleteDetails {
                reason: IncompleteReason::ContentFilter,
            }),
            ..Default::default()
        };
        assert_eq!(derive_stop_reason(&response), StopReason::EndTurn);

        // A function call wins over max_tokens.
        let response = terminal(
            r#"{
                "type": "response.completed",
                "response": {
                    "status": "incomplete",
                    "incomplete_details": {"reason": "max_output_tokens"},
                    "output": [
                        {"type": "function_call", "call_id": "c", "name": "n", "arguments": ""}
                    ]
                }
            }"#,
        );
        assert_eq!(derive_stop_reason(&response), StopReason::ToolUse);
    }

    #[test]
    fn missing_usage_reports_zeros() {
        let response = ResponsesResponse::default();
        let message = response_to_message(&response, &ToolCallIdMap::new(), "alias");
        assert_eq!(message.usage, MessagesUsage::default());
    }

    #[test]
    fn usage_accounting_is_net_of_cache_reads() {
        let usage = ResponsesUsage {
            input_tokens: 100,
            output_tokens: 20,
            total_tokens: 120,
            input_tokens_details: Some(InputTokensDetails { cached_tokens: 40 }),
        };
        let converted = MessagesUsage::from_upstream(&usage);
        assert_eq!(converted.input_tokens, 60);
        assert_eq!(converted.output_tokens, 20);
    }
}
