//! Responses-dialect wire types.
//!
//! The upstream speaks `instructions` + `input` arrays on the way in and
//! `response.*` SSE events on the way out. The bridge only models the shapes
//! translation needs; unknown events and output kinds deserialize into
//! catch-all variants and are ignored.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for the upstream Responses endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct ResponsesRequest {
    /// Model identifier.
    pub model: String,
    /// Linearized conversation input.
    pub input: Vec<InputItem>,
    /// Instructions (system prompt).
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Maximum output tokens to generate.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Whether to stream the response.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tools available for the model.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
    /// Tool selection strategy.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,
    /// Reasoning configuration.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    /// Whether the upstream should persist the response.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
}

/// Items in the `input` array.
///
/// The wire shapes are heterogeneous (bare user turns carry no `type` tag),
/// so the enum is untagged with most-specific variants first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputItem {
    /// `{type: "function_call", call_id, name, arguments}`.
    FunctionCall {
        /// Item kind, always `"function_call"`.
        #[serde(rename = "type")]
        item_type: String,
        /// Upstream-namespace call identifier.
        call_id: String,
        /// Function name.
        name: String,
        /// Arguments as a JSON string.
        arguments: String,
    },
    /// `{type: "function_call_output", call_id, output}`.
    FunctionCallOutput {
        /// Item kind, always `"function_call_output"`.
        #[serde(rename = "type")]
        item_type: String,
        /// Call identifier this output answers.
        call_id: String,
        /// Tool output text.
        output: String,
    },
    /// `{type: "message", role: "assistant", content: [{type: "output_text", ...}]}`.
    AssistantMessage {
        /// Item kind, always `"message"`.
        #[serde(rename = "type")]
        item_type: String,
        /// Role, always `"assistant"`.
        role: String,
        /// Output text parts.
        content: Vec<OutputTextPart>,
    },
    /// `{role: "user", content: "..."}` - bare user turn, no type tag.
    UserText {
        /// Role, always `"user"`.
        role: String,
        /// Turn text.
        content: String,
    },
}

impl InputItem {
    /// A bare user turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::UserText {
            role: "user".to_string(),
            content: text.into(),
        }
    }

    /// An assistant message with a single `output_text` part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::AssistantMessage {
            item_type: "message".to_string(),
            role: "assistant".to_string(),
            content: vec![OutputTextPart::new(text)],
        }
    }

    /// A prior assistant function call.
    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::FunctionCall {
            item_type: "function_call".to_string(),
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// A tool result answering a prior function call.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            item_type: "function_call_output".to_string(),
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// An `output_text` part inside an assistant input message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputTextPart {
    /// Part kind, always `"output_text"`.
    #[serde(rename = "type")]
    pub part_type: String,
    /// The text content.
    pub text: String,
}

impl OutputTextPart {
    /// Build an `output_text` part.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            part_type: "output_text".to_string(),
            text: text.into(),
        }
    }
}

/// A function tool definition in the Responses dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    /// Tool kind, always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name.
    pub name: String,
    /// Description of what the function does.
    pub description: String,
    /// JSON Schema for the parameters.
    pub parameters: serde_json::Value,
}

impl ResponsesTool {
    /// Build a function tool.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Tool choice in the Responses dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    /// Force a specific function.
    Function {
        /// Choice kind, always `"function"`.
        #[serde(rename = "type")]
        choice_type: String,
        /// Function name to call.
        name: String,
    },
    /// String-based choice (`auto`, `none`, `required`).
    Mode(String),
}

impl ResponsesToolChoice {
    /// A string-mode choice.
    pub fn mode(mode: impl Into<String>) -> Self {
        Self::Mode(mode.into())
    }

    /// Force the named function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            choice_type: "function".to_string(),
            name: name.into(),
        }
    }
}

/// Reasoning configuration sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Effort level.
    pub effort: ReasoningEffort,
    /// Summary verbosity; the bridge always requests `auto`.
    pub summary: ReasoningSummary,
}

impl ReasoningConfig {
    /// Effort with an `auto` summary.
    #[must_use]
    pub const fn with_effort(effort: ReasoningEffort) -> Self {
        Self {
            effort,
            summary: ReasoningSummary::Auto,
        }
    }
}

/// Reasoning effort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Low reasoning effort.
    Low,
    /// Medium reasoning effort.
    Medium,
    /// High reasoning effort.
    High,
    /// Extra-high reasoning effort.
    XHigh,
}

impl ReasoningEffort {
    /// Parse a lowercase effort name.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "xhigh" => Some(Self::XHigh),
            _ => None,
        }
    }

    /// The wire name of this effort level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }
}

/// Reasoning summary verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    /// Let the upstream pick.
    Auto,
    /// Concise summary.
    Concise,
    /// Detailed summary.
    Detailed,
}

// ============================================================================
// Response Types
// ============================================================================

/// A response object, as carried by `response.created` through
/// `response.completed`.
///
/// Early events carry sparse objects, so every field defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesResponse {
    /// Response identifier.
    #[serde(default)]
    pub id: String,
    /// Model that generated the response.
    #[serde(default)]
    pub model: String,
    /// Response status.
    #[serde(default)]
    pub status: ResponseStatus,
    /// Output items so far.
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Why the response is incomplete, when `status == "incomplete"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incomplete_details: Option<IncompleteDetails>,
    /// Error details, when `status == "failed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpstreamError>,
    /// Token usage, present on terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponsesUsage>,
}

impl ResponsesResponse {
    /// Whether any output item is a function call.
    #[must_use]
    pub fn has_function_call(&self) -> bool {
        self.output
            .iter()
            .any(|item| matches!(item, OutputItem::FunctionCall { .. }))
    }
}

/// Output items inside a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// An assistant message.
    Message {
        /// Role, always `"assistant"`.
        #[serde(default)]
        role: String,
        /// Content parts (may be empty during streaming).
        #[serde(default)]
        content: Vec<OutputContentPart>,
    },
    /// A function call.
    FunctionCall {
        /// Upstream-namespace call identifier (may be empty during streaming).
        #[serde(default)]
        call_id: String,
        /// Function name.
        name: String,
        /// Arguments as a JSON string (may be empty during streaming).
        #[serde(default)]
        arguments: String,
    },
    /// Reasoning output.
    Reasoning {
        /// Summary blocks (may be empty during streaming).
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    /// Any item kind the bridge does not translate.
    #[serde(other)]
    Unknown,
}

/// Content parts inside an output message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    /// Text output.
    OutputText {
        /// The text content.
        text: String,
    },
    /// Any part kind the bridge does not translate.
    #[serde(other)]
    Unknown,
}

/// Reasoning summary blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryPart {
    /// Summary text.
    SummaryText {
        /// The summary text.
        text: String,
    },
    /// Any block kind the bridge does not translate.
    #[serde(other)]
    Unknown,
}

/// Response status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Response completed successfully.
    Completed,
    /// Response generation failed.
    Failed,
    /// Response is being generated.
    #[default]
    InProgress,
    /// Response was cancelled.
    Cancelled,
    /// Response is queued for processing.
    Queued,
    /// Response is incomplete (hit a limit).
    Incomplete,
}

/// Details about why a response is incomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteDetails {
    /// The reason the response is incomplete.
    pub reason: IncompleteReason,
}

/// Reason why a response is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    /// Maximum output tokens reached.
    MaxOutputTokens,
    /// Content was filtered.
    ContentFilter,
}

/// Token usage reported by the upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    /// Input tokens consumed, cache reads included.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens generated.
    #[serde(default)]
    pub output_tokens: u64,
    /// Total tokens used.
    #[serde(default)]
    pub total_tokens: u64,
    /// Detailed input token breakdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
}

/// Detailed input token breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTokensDetails {
    /// Tokens served from cache.
    #[serde(default)]
    pub cached_tokens: u64,
}

/// Error detail attached to failed responses and error events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamError {
    /// Error kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Seconds until the rate-limit window resets, on 429 bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_in_seconds: Option<u64>,
}

/// Error body shape of non-200 upstream responses: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamErrorBody {
    /// Error details.
    pub error: UpstreamError,
}

// ============================================================================
// Streaming Events
// ============================================================================

/// SSE events emitted by the upstream.
///
/// Unknown event kinds collapse into [`UpstreamEvent::Unknown`] so new
/// upstream event types never break the converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    /// Response creation started.
    #[serde(rename = "response.created")]
    Created {
        /// The initial response object.
        response: ResponsesResponse,
    },
    /// Response is in progress.
    #[serde(rename = "response.in_progress")]
    InProgress {
        /// The response object so far.
        response: ResponsesResponse,
    },
    /// Output item added.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// The output item.
        item: OutputItem,
    },
    /// Output item completed.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// The completed item.
        item: OutputItem,
    },
    /// Content part added.
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// Index of the content part.
        #[serde(default)]
        content_index: u32,
        /// The content part.
        part: OutputContentPart,
    },
    /// Content part completed.
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// Index of the content part.
        #[serde(default)]
        content_index: u32,
        /// The completed part.
        part: OutputContentPart,
    },
    /// Text delta.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// The text fragment.
        delta: String,
    },
    /// Reasoning summary part opened.
    #[serde(rename = "response.reasoning_summary_part.added")]
    ReasoningSummaryPartAdded {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// Index within the summary.
        #[serde(default)]
        summary_index: u32,
    },
    /// Reasoning summary part closed.
    #[serde(rename = "response.reasoning_summary_part.done")]
    ReasoningSummaryPartDone {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// Index within the summary.
        #[serde(default)]
        summary_index: u32,
    },
    /// Reasoning summary text delta.
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// The summary fragment.
        delta: String,
    },
    /// Function call arguments delta.
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Index of the output item.
        #[serde(default)]
        output_index: u32,
        /// The arguments fragment.
        delta: String,
    },
    /// Response completed.
    #[serde(rename = "response.completed")]
    Completed {
        /// The terminal response object.
        response: ResponsesResponse,
    },
    /// Response ended incomplete; carries the same terminal payload.
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// The terminal response object.
        response: ResponsesResponse,
    },
    /// Response failed.
    #[serde(rename = "response.failed")]
    Failed {
        /// The response object carrying the error.
        response: ResponsesResponse,
    },
    /// Error event.
    #[serde(rename = "error")]
    Error {
        /// Error details.
        error: UpstreamError,
    },
    /// Any event kind the bridge does not translate.
    #[serde(other)]
    Unknown,
}
