//! Stores: the runtime that owns state and drives reducers and effects.
//!
//! A root [`Store`] processes actions through its reducer one at a time,
//! runs the resulting effects and publishes the new state. Derived stores
//! created with [`Store::scope`] focus on part of the state and forward
//! their actions back to the root. A [`ViewStore`] deduplicates publications
//! for rendering code.

mod scope;
mod store;
mod subscription;
mod view;

pub use store::Store;
pub use subscription::{StateStream, Subscription};
pub use view::ViewStore;
