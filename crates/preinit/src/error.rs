//! Error types for the warm-up machinery.
//!
//! None of these ever reach the caller of
//! [`PreinitCoordinator`](crate::PreinitCoordinator). They exist so the internal
//! seams (running an initializer, spawning the worker, waiting on it) can use
//! `Result` and `?` before the coordinator discards the outcome.

use std::io;
use thiserror::Error;

/// Boxed error type returned by fallible initializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised on the internal boundaries of the warm-up worker.
#[derive(Debug, Error)]
pub enum PreinitError {
    /// An initializer returned an error.
    #[error("initializer `{name}` failed: {source}")]
    Initializer {
        name: String,
        #[source]
        source: BoxError,
    },

    /// An initializer panicked.
    #[error("initializer `{name}` panicked: {message}")]
    Panicked { name: String, message: String },

    /// The background worker could not be launched.
    #[error("failed to spawn warm-up worker: {0}")]
    Spawn(#[from] io::Error),

    /// Warm-up was skipped by configuration before any worker was spawned.
    #[error("warm-up disabled: {0}")]
    Disabled(&'static str),

    /// The waiting thread was interrupted before the worker completed.
    #[error("interrupted while waiting for warm-up worker")]
    Interrupted,
}
