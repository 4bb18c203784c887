//! Effects: asynchronous, cancellable producers of follow-up actions.
//!
//! This module provides:
//! - `Effect`: the value a reducer returns to describe work
//! - `Emitter`: manual emission for `Effect::run`
//! - `CancelId`: type-erased identity for cancellation

mod cancel;
mod effect;
mod merge;
#[cfg(feature = "tokio")]
mod time;

pub use cancel::CancelId;
pub(crate) use cancel::EffectContext;
pub use effect::{Effect, Emitter};
