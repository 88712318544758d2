//! # crosswire-bridge
//!
//! Translation core of the crosswire protocol bridge. Clients speak the
//! Messages dialect; the upstream speaks the Responses dialect and only
//! streams. This crate owns the mapping in both directions:
//!
//! - [`request::translate_request`] turns a Messages body into a Responses
//!   body, allocating the per-request tool-call identifier map.
//! - [`adapter::adapt`] applies deployment-level rewrites to the outbound
//!   body (field stripping, instruction injection), scoped by client
//!   identity.
//! - [`stream::StreamConverter`] transcodes the upstream SSE event stream
//!   into Messages-dialect frames on the fly.
//! - [`collect::collect_completed`] + [`convert::response_to_message`]
//!   synthesize a single JSON body for non-streaming clients.
//! - [`upstream::UpstreamClient`] opens the upstream and classifies its
//!   error statuses.
//!
//! Everything is per-request: the crate holds no mutable process-wide state.

pub mod adapter;
pub mod collect;
pub mod convert;
mod error;
pub mod model;
pub mod request;
pub mod stream;
pub mod upstream;

pub use adapter::{AdaptContext, AdaptOutcome, adapt};
pub use collect::collect_completed;
pub use convert::{derive_stop_reason, response_to_message};
pub use error::{BridgeError, sanitize_message};
pub use model::split_reasoning_suffix;
pub use request::{TranslatedRequest, translate_request};
pub use stream::StreamConverter;
pub use upstream::{
    DEFAULT_TIMEOUT, UpstreamClient, UpstreamConnection, UpstreamEventStream, prepare_outbound,
};
