//! # Rudder
//!
//! Unidirectional state management for Rust.
//!
//! Application state lives in a [`Store`]. The only way to change it is to
//! [`send`](Store::send) an action, which the store runs through a
//! [`Reducer`]. The reducer mutates the state and returns an [`Effect`]
//! describing any further work, such as a network request or a timer, whose
//! output is fed back into the store as more actions.
//!
//! ## Reducers
//!
//! - [`Reducer`] - `(state, action, environment) -> effect`
//! - [`Reducer::combine`], [`Reducer::pullback`], [`Reducer::optional`] and
//!   [`Reducer::for_each`] build large reducers out of small ones
//! - [`Lens`] and [`CasePath`] (usually via [`case!`]) describe how a child
//!   state and action embed in their parents
//!
//! ## Effects
//!
//! - [`Effect`] - a lazily started, cancellable stream of actions
//! - [`CancelId`] - identity used to cancel in-flight effects
//!
//! ## Stores
//!
//! - [`Store`] - owns state, drains actions in FIFO order and runs effects
//! - [`Store::scope`] - a derived store focused on part of the state
//! - [`ViewStore`] - deduplicated publications for rendering code
//!
//! Stores are single-threaded. Effects that do not finish synchronously run
//! on the [`Runtime`](runtime::Runtime) executor captured when the store was
//! created: by default the current `tokio::task::LocalSet`.
//!
//! ```
//! use rudder::{Effect, Reducer, Store};
//!
//! #[derive(Clone, Debug)]
//! enum Action {
//!     Increment,
//!     Decrement,
//! }
//!
//! let reducer = Reducer::new(|count: &mut i64, action: Action, _env: &()| {
//!     match action {
//!         Action::Increment => *count += 1,
//!         Action::Decrement => *count -= 1,
//!     }
//!     Effect::none()
//! });
//!
//! let store = Store::new(0, reducer, ());
//! store.send(Action::Increment);
//! store.send(Action::Increment);
//! store.send(Action::Decrement);
//! assert_eq!(store.get(), 1);
//! ```

pub mod effect;
mod error;
pub mod reducer;
pub mod runtime;
pub mod store;

pub use effect::{CancelId, Effect, Emitter};
pub use error::{Error, Result};
pub use reducer::{CasePath, Elements, Lens, Reducer};
pub use store::{StateStream, Store, Subscription, ViewStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let reducer = Reducer::new(|n: &mut i32, delta: i32, _: &()| {
            *n += delta;
            Effect::none()
        });
        let store = Store::new(0, reducer, ());
        store.send(40);
        store.send(2);
        assert_eq!(store.get(), 42);
    }
}
