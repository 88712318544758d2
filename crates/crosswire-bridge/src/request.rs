//! Messages-to-Responses request translation.
//!
//! Linearizes a Messages-dialect conversation into the upstream `input`
//! array, extracts instructions from the system prompt, converts tools, and
//! allocates the per-request tool-call identifier map that the response path
//! consults later.

use crosswire_common::ids::{ToolCallIdMap, mint_call_id};
use crosswire_common::messages::{
    ChatMessage, ChatRole, ContentBlock, MessageContent, MessagesRequest, MessagesToolChoice,
    SystemPart, SystemPrompt, ToolDefinition, ToolResultBlock, ToolResultContent,
};
use crosswire_common::responses::{
    InputItem, ReasoningConfig, ReasoningEffort, ResponsesRequest, ResponsesTool,
    ResponsesToolChoice,
};

use crate::model::split_reasoning_suffix;

/// System parts with these prefixes are transport metadata, not instructions.
const IGNORED_SYSTEM_PREFIXES: &[&str] = &["x-anthropic-billing-header", "<system-reminder>"];

/// Thinking budgets up to this many tokens map to medium effort.
const MEDIUM_EFFORT_BUDGET: u32 = 20_000;

/// A translated request plus the state the response path needs.
#[derive(Debug, Clone)]
pub struct TranslatedRequest {
    /// The Responses-dialect body.
    pub body: ResponsesRequest,
    /// Client-to-upstream tool identifier map built during linearization.
    pub tool_ids: ToolCallIdMap,
    /// The model name with any effort suffix removed.
    pub model: String,
}

/// Translate a Messages-dialect request into a Responses-dialect body.
#[must_use]
pub fn translate_request(request: &MessagesRequest) -> TranslatedRequest {
    let (model, effort_from_name) = split_reasoning_suffix(&request.model);
    let effort = effort_from_name
        .or_else(|| effort_from_thinking(request))
        .unwrap_or(ReasoningEffort::Medium);

    let instructions = extract_instructions(request.system.as_ref());

    let mut tool_ids = ToolCallIdMap::new();
    let mut input = Vec::new();
    for message in &request.messages {
        match message.role {
            ChatRole::User => linearize_user_turn(message, &tool_ids, &mut input),
            ChatRole::Assistant => linearize_assistant_turn(message, &mut tool_ids, &mut input),
        }
    }

    let tools = convert_tools(request.tools.as_deref());
    let tool_choice = request.tool_choice.as_ref().and_then(convert_tool_choice);

    let body = ResponsesRequest::builder()
        .model(model.to_string())
        .input(input)
        .instructions(instructions)
        .max_output_tokens(request.max_tokens)
        .stream(request.stream)
        .tools(tools)
        .tool_choice(tool_choice)
        .reasoning(Some(ReasoningConfig::with_effort(effort)))
        .build();

    TranslatedRequest {
        body,
        tool_ids,
        model: model.to_string(),
    }
}

/// Effort fallback from the thinking config: small budgets mean medium,
/// larger ones high.
fn effort_from_thinking(request: &MessagesRequest) -> Option<ReasoningEffort> {
    let thinking = request.thinking.as_ref()?;
    if thinking.config_type != "enabled" {
        return None;
    }
    let budget = thinking.budget_tokens?;
    Some(if budget <= MEDIUM_EFFORT_BUDGET {
        ReasoningEffort::Medium
    } else {
        ReasoningEffort::High
    })
}

/// Join the contributing system parts into instruction text.
///
/// Returns `None` when nothing contributes, so the outbound body omits the
/// field entirely.
fn extract_instructions(system: Option<&SystemPrompt>) -> Option<String> {
    let parts: Vec<&str> = match system? {
        SystemPrompt::Text(text) => {
            if contributes(text) {
                vec![text.as_str()]
            } else {
                Vec::new()
            }
        }
        SystemPrompt::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                SystemPart::Text { text } if contributes(text) => Some(text.as_str()),
                _ => None,
            })
            .collect(),
    };

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn contributes(text: &str) -> bool {
    !text.is_empty()
        && !IGNORED_SYSTEM_PREFIXES
            .iter()
            .any(|prefix| text.starts_with(prefix))
}

fn linearize_user_turn(message: &ChatMessage, tool_ids: &ToolCallIdMap, input: &mut Vec<InputItem>) {
    match &message.content {
        MessageContent::Text(text) => input.push(InputItem::user_text(text.clone())),
        MessageContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => input.push(InputItem::user_text(text.clone())),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => {
                        let call_id = tool_ids
                            .get(tool_use_id)
                            .unwrap_or(tool_use_id.as_str())
                            .to_string();
                        input.push(InputItem::function_call_output(
                            call_id,
                            tool_result_text(content.as_ref()),
                        ));
                    }
                    _ => {}
                }
            }
        }
    }
}

fn linearize_assistant_turn(
    message: &ChatMessage,
    tool_ids: &mut ToolCallIdMap,
    input: &mut Vec<InputItem>,
) {
    match &message.content {
        MessageContent::Text(text) => input.push(InputItem::assistant_text(text.clone())),
        MessageContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    // Thinking blocks are never replayed upstream.
                    ContentBlock::Thinking { .. } => {}
                    ContentBlock::Text { text } => {
                        input.push(InputItem::assistant_text(text.clone()));
                    }
                    ContentBlock::ToolUse {
                        id,
                        name,
                        input: tool_input,
                    } => {
                        let call_id = mint_call_id();
                        tool_ids.insert(id.clone(), call_id.clone());
                        input.push(InputItem::function_call(
                            call_id,
                            name.clone(),
                            arguments_string(tool_input),
                        ));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Tool inputs travel as JSON strings upstream; strings pass through as-is.
fn arguments_string(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
    }
}

fn tool_result_text(content: Option<&ToolResultContent>) -> String {
    match content {
        Some(ToolResultContent::Text(text)) => text.clone(),
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                ToolResultBlock::Text { text } => Some(text.as_str()),
                ToolResultBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    }
}

fn convert_tools(tools: Option<&[ToolDefinition]>) -> Option<Vec<ResponsesTool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| {
                ResponsesTool::function(
                    tool.name.clone(),
                    tool.description.clone().unwrap_or_default(),
                    tool.input_schema
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({})),
                )
            })
            .collect(),
    )
}

fn convert_tool_choice(choice: &MessagesToolChoice) -> Option<ResponsesToolChoice> {
    match choice {
        MessagesToolChoice::Mode(mode) => match mode.as_str() {
            "auto" | "none" => Some(ResponsesToolChoice::mode(mode.clone())),
            "any" => Some(ResponsesToolChoice::mode("required")),
            _ => None,
        },
        MessagesToolChoice::Typed { choice_type, name } => match (choice_type.as_str(), name) {
            ("auto", _) => Some(ResponsesToolChoice::mode("auto")),
            ("any", _) => Some(ResponsesToolChoice::mode("required")),
            ("tool", Some(name)) => Some(ResponsesToolChoice::function(name.clone())),
            _ => None,
        },
    }
}
