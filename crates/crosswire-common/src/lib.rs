//! # crosswire-common
//!
//! Wire types shared by the crosswire protocol bridge: the client-facing
//! Messages dialect, the upstream Responses dialect, the per-request
//! tool-call identifier map, adapter configuration, and usage accounting.
//!
//! The two dialect modules model *observed* shapes only - the bridge maps
//! between APIs, it does not re-implement either one.

pub mod account;
pub mod adapter;
pub mod ids;
pub mod messages;
pub mod responses;
pub mod usage;

pub use account::{AccountType, SelectedAccount};
pub use adapter::{AdapterConfig, InstructionMode, InstructionScope, StripFieldsConfig};
pub use ids::{ToolCallIdMap, mint_call_id, mint_message_id, mint_tool_use_id};
pub use messages::{
    ApiError, ErrorBody, MessageResponse, MessagesRequest, MessagesUsage, ResponseBlock,
    StopReason, StreamFrame,
};
pub use responses::{
    ReasoningEffort, ResponsesRequest, ResponsesResponse, ResponsesUsage, UpstreamEvent,
};
pub use usage::{RateLimitMark, RateLimitSnapshot, UsageTally};
