//! Non-streaming collection.
//!
//! The upstream only streams, so serving a non-streaming client means
//! draining the event stream and keeping the terminal response payload.

use futures::{Stream, StreamExt};
use log::debug;

use crosswire_common::responses::{ResponsesResponse, UpstreamEvent};

use crate::error::BridgeError;

/// Drain an upstream event stream and return the terminal response.
///
/// The last `response.completed` (or `response.incomplete`, which carries
/// the same terminal payload) wins.
///
/// # Errors
///
/// Returns [`BridgeError::StreamEndedEarly`] when the stream finishes
/// without a terminal event, and propagates transport errors as-is.
pub async fn collect_completed<S>(mut events: S) -> Result<ResponsesResponse, BridgeError>
where
    S: Stream<Item = Result<UpstreamEvent, BridgeError>> + Unpin,
{
    let mut terminal: Option<ResponsesResponse> = None;

    while let Some(event) = events.next().await {
        match event? {
            UpstreamEvent::Completed { response } | UpstreamEvent::Incomplete { response } => {
                terminal = Some(response);
            }
            other => {
                debug!("collector skipping {}", event_kind(&other));
            }
        }
    }

    terminal.ok_or(BridgeError::StreamEndedEarly)
}

fn event_kind(event: &UpstreamEvent) -> &'static str {
    match event {
        UpstreamEvent::Created { .. } => "response.created",
        UpstreamEvent::InProgress { .. } => "response.in_progress",
        UpstreamEvent::OutputItemAdded { .. } => "response.output_item.added",
        UpstreamEvent::OutputItemDone { .. } => "response.output_item.done",
        UpstreamEvent::ContentPartAdded { .. } => "response.content_part.added",
        UpstreamEvent::ContentPartDone { .. } => "response.content_part.done",
        UpstreamEvent::OutputTextDelta { .. } => "response.output_text.delta",
        UpstreamEvent::ReasoningSummaryPartAdded { .. } => "response.reasoning_summary_part.added",
        UpstreamEvent::ReasoningSummaryPartDone { .. } => "response.reasoning_summary_part.done",
        UpstreamEvent::ReasoningSummaryTextDelta { .. } => "response.reasoning_summary_text.delta",
        UpstreamEvent::FunctionCallArgumentsDelta { .. } => {
            "response.function_call_arguments.delta"
        }
        UpstreamEvent::Completed { .. } => "response.completed",
        UpstreamEvent::Incomplete { .. } => "response.incomplete",
        UpstreamEvent::Failed { .. } => "response.failed",
        UpstreamEvent::Error { .. } => "error",
        UpstreamEvent::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::stream;

    fn event(raw: serde_json::Value) -> Result<UpstreamEvent, BridgeError> {
        Ok(serde_json::from_value(raw).unwrap())
    }

    #[tokio::test]
    async fn keeps_the_last_terminal_payload() {
        let events = stream::iter(vec![
            event(serde_json::json!({"type": "response.created",
                "response": {"id": "r", "status": "in_progress"}})),
            event(serde_json::json!({"type": "response.output_text.delta",
                "output_index": 0, "delta": "Hi"})),
            event(serde_json::json!({"type": "response.completed",
                "response": {"id": "r", "status": "completed",
                    "usage": {"input_tokens": 5, "output_tokens": 1}}})),
        ]);

        let response = collect_completed(events).await.unwrap();
        assert_eq!(response.id, "r");
        assert_eq!(response.usage.unwrap().input_tokens, 5);
    }

    #[tokio::test]
    async fn stream_without_terminal_event_errors() {
        let events = stream::iter(vec![event(serde_json::json!({"type": "response.created",
            "response": {"id": "r", "status": "in_progress"}}))]);

        let error = collect_completed(events).await.unwrap_err();
        assert!(matches!(error, BridgeError::StreamEndedEarly));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let events = stream::iter(vec![
            event(serde_json::json!({"type": "response.created",
                "response": {"id": "r", "status": "in_progress"}})),
            Err(BridgeError::Stream("connection reset".to_string())),
        ]);

        let error = collect_completed(events).await.unwrap_err();
        assert!(matches!(error, BridgeError::Stream(_)));
    }

    #[tokio::test]
    async fn incomplete_counts_as_terminal() {
        let events = stream::iter(vec![event(serde_json::json!({"type": "response.incomplete",
            "response": {"id": "r", "status": "incomplete",
                "incomplete_details": {"reason": "max_output_tokens"}}}))]);

        let response = collect_completed(events).await.unwrap();
        assert_eq!(
            response.status,
            crosswire_common::responses::ResponseStatus::Incomplete
        );
    }
}
