//! Runtime support for effects.
//!
//! This module provides the executor context that drives effects which do
//! not complete synchronously inside a store's drain loop.

mod context;

#[cfg(feature = "tokio")]
pub use context::TokioLocal;
pub use context::{Executor, Runtime};
