//! Messages-dialect wire types.
//!
//! These are the shapes the bridge accepts from clients and the shapes it
//! writes back: `system` + `messages` + `tools` on the way in,
//! `message_start` / `content_block_*` / `message_delta` / `message_stop`
//! SSE frames (or a single `message` JSON body) on the way out.

use serde::{Deserialize, Serialize};

use crate::responses::ResponsesUsage;

// ============================================================================
// Request Types
// ============================================================================

/// A chat request in the Messages dialect.
///
/// Fields the bridge does not translate are intentionally absent; clients may
/// send more, and the translator ignores what it does not know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// Model identifier as requested by the client.
    pub model: String,
    /// Conversation turns.
    pub messages: Vec<ChatMessage>,
    /// System prompt - a bare string or an ordered list of typed parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    /// Available tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool selection strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<MessagesToolChoice>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the client wants SSE framing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Extended thinking configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

/// System prompt - either a plain string or an array of content parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Simple text system prompt.
    Text(String),
    /// Ordered sequence of typed parts.
    Parts(Vec<SystemPart>),
}

/// A single part of a structured system prompt.
///
/// Non-text parts are tolerated on the wire and skipped during translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemPart {
    /// Text content part.
    Text {
        /// The text content.
        text: String,
    },
    /// Any part kind the bridge does not translate.
    #[serde(other)]
    Other,
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the turn.
    pub role: ChatRole,
    /// Turn content - a bare string or a list of content blocks.
    pub content: MessageContent,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// Message content - a plain string or an array of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content (shorthand for a single text block).
    Text(String),
    /// Array of content blocks.
    Blocks(Vec<ContentBlock>),
}

/// Content block kinds that can appear inside a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block.
    Text {
        /// The text content.
        text: String,
    },
    /// Thinking block from a prior assistant turn.
    Thinking {
        /// The thinking content.
        thinking: String,
        /// Signature attached by the producing backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool invocation requested by a prior assistant turn.
    ToolUse {
        /// Client-side tool call identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Structured tool input.
        input: serde_json::Value,
    },
    /// Result of a tool invocation, sent back by the client.
    ToolResult {
        /// Identifier of the `tool_use` block this answers.
        tool_use_id: String,
        /// Result content - a string or a list of text blocks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool execution failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Any block kind the bridge does not translate.
    #[serde(other)]
    Other,
}

/// Content of a tool result - a string or an array of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Simple string content.
    Text(String),
    /// Array of content blocks.
    Blocks(Vec<ToolResultBlock>),
}

/// Blocks that can appear inside a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultBlock {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Non-text content (images and the like); dropped during translation.
    #[serde(other)]
    Other,
}

/// A tool definition as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Description of what the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

/// Tool choice - a bare mode string or a typed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagesToolChoice {
    /// String-based choice (`auto`, `any`, `none`).
    Mode(String),
    /// Object form: `{type, name?}`.
    Typed {
        /// Choice kind (`auto`, `any`, `tool`).
        #[serde(rename = "type")]
        choice_type: String,
        /// Tool name, present when `type == "tool"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Extended thinking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Kind, `enabled` or `disabled`.
    #[serde(rename = "type")]
    pub config_type: String,
    /// Token budget for thinking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

// ============================================================================
// Response Types
// ============================================================================

/// A complete assistant message, as returned to non-streaming clients and
/// embedded in `message_start` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message identifier (`msg_` + 32 hex).
    pub id: String,
    /// Object kind, always `"message"`.
    #[serde(rename = "type")]
    pub response_type: String,
    /// Role, always `"assistant"`.
    pub role: String,
    /// Content blocks.
    pub content: Vec<ResponseBlock>,
    /// Model name reported to the client.
    pub model: String,
    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,
    /// Stop sequence that ended generation, never set by the bridge.
    pub stop_sequence: Option<String>,
    /// Token accounting.
    pub usage: MessagesUsage,
}

impl MessageResponse {
    /// An empty assistant message shell, used for `message_start`.
    #[must_use]
    pub fn started(id: String, model: String) -> Self {
        Self {
            id,
            response_type: "message".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
            model,
            stop_reason: None,
            stop_sequence: None,
            usage: MessagesUsage::default(),
        }
    }
}

/// Content blocks the bridge produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Text output.
    Text {
        /// The text content.
        text: String,
    },
    /// Thinking (reasoning summary) output.
    Thinking {
        /// The thinking content.
        thinking: String,
    },
    /// Tool invocation request.
    ToolUse {
        /// Tool call identifier in the client's namespace.
        id: String,
        /// Tool name.
        name: String,
        /// Parsed tool input.
        input: serde_json::Value,
    },
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn.
    EndTurn,
    /// Maximum output tokens reached.
    MaxTokens,
    /// Model wants to use a tool.
    ToolUse,
}

/// Token usage in the Messages dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesUsage {
    /// Net input tokens (upstream input minus cache reads).
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens spent creating cache entries. The upstream does not report
    /// these separately, so the bridge always surfaces zero.
    pub cache_creation_input_tokens: u64,
    /// Tokens read from cache.
    pub cache_read_input_tokens: u64,
}

impl MessagesUsage {
    /// Convert upstream usage into Messages-dialect accounting.
    ///
    /// Net input is `input_tokens - cached_tokens`, never negative.
    #[must_use]
    pub fn from_upstream(usage: &ResponsesUsage) -> Self {
        let cached = usage
            .input_tokens_details
            .as_ref()
            .map_or(0, |d| d.cached_tokens);
        Self {
            input_tokens: usage.input_tokens.saturating_sub(cached),
            output_tokens: usage.output_tokens,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: cached,
        }
    }
}

// ============================================================================
// Streaming Frames
// ============================================================================

/// SSE frames the bridge emits to streaming clients.
///
/// The serialized form is the `data:` payload; [`StreamFrame::event_name`]
/// supplies the matching `event:` line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Message has started.
    MessageStart {
        /// Empty message shell carrying id, model, and zeroed usage.
        message: MessageResponse,
    },
    /// A content block has started.
    ContentBlockStart {
        /// Index of this content block.
        index: u32,
        /// The starting content block.
        content_block: ResponseBlock,
    },
    /// Delta update for a content block.
    ContentBlockDelta {
        /// Index of the content block being updated.
        index: u32,
        /// The delta payload.
        delta: FrameDelta,
    },
    /// A content block has finished.
    ContentBlockStop {
        /// Index of the content block that finished.
        index: u32,
    },
    /// Message-level delta carrying the stop reason and final usage.
    MessageDelta {
        /// Stop reason and stop sequence.
        delta: MessageDeltaBody,
        /// Final token accounting.
        usage: MessagesUsage,
    },
    /// Message has finished.
    MessageStop,
    /// Error frame.
    Error {
        /// Error details.
        error: ApiError,
    },
}

impl StreamFrame {
    /// The SSE `event:` name for this frame.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Error { .. } => "error",
        }
    }
}

/// Delta payloads inside `content_block_delta` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameDelta {
    /// Text to append.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// Thinking content to append.
    ThinkingDelta {
        /// The thinking fragment.
        thinking: String,
    },
    /// Partial JSON for a tool input.
    InputJsonDelta {
        /// JSON fragment to accumulate.
        partial_json: String,
    },
}

/// Body of a `message_delta` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    /// Stop reason if generation ended.
    pub stop_reason: Option<StopReason>,
    /// Stop sequence that ended generation.
    pub stop_sequence: Option<String>,
}

// ============================================================================
// Error Envelope
// ============================================================================

/// Error detail surfaced to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error kind (`rate_limit_error`, `authentication_error`, ...).
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Build an error detail from kind and message.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// JSON error body for non-streaming clients: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ApiError,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn request_accepts_string_and_block_content() {
        let raw = serde_json::json!({
            "model": "gpt-5.2-codex",
            "max_tokens": 1024,
            "system": [
                {"type": "text", "text": "Be terse."},
                {"type": "billing", "note": "ignored"}
            ],
            "messages": [
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "hi"},
                    {"type": "tool_use", "id": "toolu_1", "name": "run", "input": {"x": 1}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "done"}
                ]}
            ]
        });

        let request: MessagesRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.messages.len(), 3);
        assert!(matches!(
            request.system,
            Some(SystemPrompt::Parts(ref parts)) if parts.len() == 2
        ));
        let Some(SystemPrompt::Parts(parts)) = request.system else {
            unreachable!()
        };
        assert!(matches!(parts[1], SystemPart::Other));
    }

    #[test]
    fn tool_choice_parses_both_forms() {
        let mode: MessagesToolChoice = serde_json::from_value(serde_json::json!("any")).unwrap();
        assert!(matches!(mode, MessagesToolChoice::Mode(ref m) if m == "any"));

        let typed: MessagesToolChoice =
            serde_json::from_value(serde_json::json!({"type": "tool", "name": "grep"})).unwrap();
        let MessagesToolChoice::Typed { choice_type, name } = typed else {
            panic!("expected typed choice");
        };
        assert_eq!(choice_type, "tool");
        assert_eq!(name.as_deref(), Some("grep"));
    }

    #[test]
    fn stream_frame_event_names_match_serialized_type() {
        let frame = StreamFrame::ContentBlockStop { index: 3 };
        assert_eq!(frame.event_name(), "content_block_stop");

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "content_block_stop");
        assert_eq!(value["index"], 3);
    }

    #[test]
    fn usage_from_upstream_subtracts_cache_reads() {
        let upstream = ResponsesUsage {
            input_tokens: 100,
            output_tokens: 20,
            total_tokens: 120,
            input_tokens_details: Some(crate::responses::InputTokensDetails { cached_tokens: 40 }),
        };

        let usage = MessagesUsage::from_upstream(&upstream);
        assert_eq!(usage.input_tokens, 60);
        assert_eq!(usage.output_tokens, 20);
        assert_eq!(usage.cache_read_input_tokens, 40);
        assert_eq!(usage.cache_creation_input_tokens, 0);
    }

    #[test]
    fn usage_never_goes_negative_on_inconsistent_upstream_counts() {
        let upstream = ResponsesUsage {
            input_tokens: 10,
            output_tokens: 0,
            total_tokens: 10,
            input_tokens_details: Some(crate::responses::InputTokensDetails { cached_tokens: 50 }),
        };

        assert_eq!(MessagesUsage::from_upstream(&upstream).input_tokens, 0);
    }
}
