//! Transition functions and their combinators.
//!
//! - `Reducer`: the `(state, action, environment) -> effect` function
//! - `Lens` / `CasePath`: explicit accessors for pulling reducers back
//! - `Elements`: keyed collections for `Reducer::for_each`

mod elements;
mod lens;
mod reducer;

pub use elements::Elements;
pub use lens::{CasePath, Lens};
pub use reducer::Reducer;
