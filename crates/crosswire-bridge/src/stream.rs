//! Streaming SSE transcoding.
//!
//! [`StreamConverter`] is a per-request state machine: it consumes upstream
//! `response.*` events in arrival order and emits Messages-dialect frames.
//! Content blocks are bracketed by `content_block_start` / `content_block_stop`
//! at a strictly monotonic index, `message_start` is emitted at most once,
//! and the terminal event produces `message_delta` + `message_stop` with the
//! final usage accounting.

use log::debug;
use serde_json::json;

use crosswire_common::ids::{ToolCallIdMap, mint_message_id};
use crosswire_common::messages::{
    FrameDelta, MessageDeltaBody, MessageResponse, MessagesUsage, ResponseBlock, StreamFrame,
};
use crosswire_common::responses::{OutputContentPart, OutputItem, UpstreamEvent};

use crate::convert::derive_stop_reason;

/// Stateful Responses-to-Messages stream transcoder.
///
/// All state is private to one request; the converter is created when the
/// upstream connection opens and dropped at stream end.
#[derive(Debug)]
pub struct StreamConverter {
    message_id: String,
    alias_model: String,
    tool_ids: ToolCallIdMap,
    block_index: u32,
    block_open: bool,
    message_start_sent: bool,
    current_call: Option<(String, String)>,
    final_usage: Option<MessagesUsage>,
    finished: bool,
}

impl StreamConverter {
    /// A converter for one request.
    ///
    /// `tool_ids` is the map the request translator built; the converter
    /// reads it to restore client-side tool identifiers.
    #[must_use]
    pub fn new(alias_model: impl Into<String>, tool_ids: ToolCallIdMap) -> Self {
        Self {
            message_id: mint_message_id(),
            alias_model: alias_model.into(),
            tool_ids,
            block_index: 0,
            block_open: false,
            message_start_sent: false,
            current_call: None,
            final_usage: None,
            finished: false,
        }
    }

    /// Final usage once the terminal event has been seen.
    #[must_use]
    pub const fn final_usage(&self) -> Option<MessagesUsage> {
        self.final_usage
    }

    /// Whether a terminal event has been transcoded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one upstream event, producing zero or more client frames.
    pub fn handle_event(&mut self, event: UpstreamEvent) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        match event {
            UpstreamEvent::Created { .. } => self.ensure_message_start(&mut frames),

            UpstreamEvent::OutputItemAdded { item, .. } => {
                self.ensure_message_start(&mut frames);
                if let OutputItem::FunctionCall { call_id, name, .. } = item {
                    let id = self.tool_ids.reverse_or_mint(&call_id);
                    self.current_call = Some((call_id, name.clone()));
                    self.open_block(
                        ResponseBlock::ToolUse {
                            id,
                            name,
                            input: json!({}),
                        },
                        &mut frames,
                    );
                }
            }

            UpstreamEvent::ReasoningSummaryPartAdded { .. } => {
                self.open_block(
                    ResponseBlock::Thinking {
                        thinking: String::new(),
                    },
                    &mut frames,
                );
            }

            UpstreamEvent::ReasoningSummaryTextDelta { delta, .. } => {
                self.push_delta(FrameDelta::ThinkingDelta { thinking: delta }, &mut frames);
            }

            UpstreamEvent::ReasoningSummaryPartDone { .. } => self.close_block(&mut frames),

            UpstreamEvent::ContentPartAdded { part, .. } => {
                if matches!(part, OutputContentPart::OutputText { .. }) {
                    self.open_block(
                        ResponseBlock::Text {
                            text: String::new(),
                        },
                        &mut frames,
                    );
                }
            }

            UpstreamEvent::OutputTextDelta { delta, .. } => {
                self.push_delta(FrameDelta::TextDelta { text: delta }, &mut frames);
            }

            UpstreamEvent::ContentPartDone { .. } => self.close_block(&mut frames),

            UpstreamEvent::FunctionCallArgumentsDelta { delta, .. } => {
                self.push_delta(
                    FrameDelta::InputJsonDelta {
                        partial_json: delta,
                    },
                    &mut frames,
                );
            }

            UpstreamEvent::OutputItemDone { item, .. } => {
                if matches!(item, OutputItem::FunctionCall { .. }) {
                    if let Some((call_id, name)) = self.current_call.take() {
                        debug!("function call {name} ({call_id}) complete");
                    }
                    self.close_block(&mut frames);
                }
            }

            UpstreamEvent::Completed { response } | UpstreamEvent::Incomplete { response } => {
                self.ensure_message_start(&mut frames);
                if self.block_open {
                    // Terminal event with a dangling block; close it so the
                    // frame sequence stays well-formed.
                    self.close_block(&mut frames);
                }
                let usage = response
                    .usage
                    .as_ref()
                    .map(MessagesUsage::from_upstream)
                    .unwrap_or_default();
                self.final_usage = Some(usage);
                self.finished = true;
                frames.push(StreamFrame::MessageDelta {
                    delta: MessageDeltaBody {
                        stop_reason: Some(derive_stop_reason(&response)),
                        stop_sequence: None,
                    },
                    usage,
                });
                frames.push(StreamFrame::MessageStop);
            }

            UpstreamEvent::InProgress { .. }
            | UpstreamEvent::Failed { .. }
            | UpstreamEvent::Error { .. }
            | UpstreamEvent::Unknown => {
                debug!("ignoring upstream event with no client-facing frame");
            }
        }
        frames
    }

    fn ensure_message_start(&mut self, frames: &mut Vec<StreamFrame>) {
        if !self.message_start_sent {
            self.message_start_sent = true;
            frames.push(StreamFrame::MessageStart {
                message: MessageResponse::started(
                    self.message_id.clone(),
                    self.alias_model.clone(),
                ),
            });
        }
    }

    fn open_block(&mut self, block: ResponseBlock, frames: &mut Vec<StreamFrame>) {
        self.ensure_message_start(frames);
        self.block_open = true;
        frames.push(StreamFrame::ContentBlockStart {
            index: self.block_index,
            content_block: block,
        });
    }

    fn push_delta(&mut self, delta: FrameDelta, frames: &mut Vec<StreamFrame>) {
        if self.block_open {
            frames.push(StreamFrame::ContentBlockDelta {
                index: self.block_index,
                delta,
            });
        }
    }

    fn close_block(&mut self, frames: &mut Vec<StreamFrame>) {
        if self.block_open {
            frames.push(StreamFrame::ContentBlockStop {
                index: self.block_index,
            });
            self.block_open = false;
            self.block_index += 1;
        }
    }
}
