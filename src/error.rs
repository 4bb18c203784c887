//! Error types for the store runtime.

use futures::task::SpawnError;
use thiserror::Error;

/// Errors surfaced by the runtime.
///
/// `Store::send` is fire-and-forget, so these are mostly seen in logs; the
/// executor entry point [`Runtime::spawn`](crate::runtime::Runtime::spawn)
/// returns them directly.
#[derive(Debug, Error)]
pub enum Error {
    /// The executor refused to accept an effect task
    #[error("failed to spawn effect task: {0}")]
    Spawn(#[from] SpawnError),
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
