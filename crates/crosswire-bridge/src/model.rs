//! Model-name parsing.
//!
//! Clients can ask for a reasoning effort by suffixing the model name, e.g.
//! `gpt-5.2-codex-xhigh`. The suffix is only split off when it names a known
//! effort level; anything else is part of the model name.

use crosswire_common::responses::ReasoningEffort;

/// Split a trailing `-<effort>` suffix off a model name.
///
/// Returns the model with the suffix removed and the parsed effort, or the
/// input unchanged when the tail is not a known effort.
#[must_use]
pub fn split_reasoning_suffix(model: &str) -> (&str, Option<ReasoningEffort>) {
    match model.rfind('-') {
        None | Some(0) => (model, None),
        Some(pos) => {
            let suffix = model[pos + 1..].to_ascii_lowercase();
            ReasoningEffort::from_suffix(&suffix)
                .map_or((model, None), |effort| (&model[..pos], Some(effort)))
        }
    }
}
