//! # Preinit
//!
//! Background warm-up for application bootstrap.
//!
//! ## Overview
//!
//! Many applications pay a one-time cost the first time some facility is used:
//! building a codec registry, compiling a set of regexes, loading a lookup
//! table. When that first use lands on a latency-sensitive path (the first
//! request), the cost shows up as a slow response. This crate moves that work
//! onto a background thread that overlaps with the rest of bootstrap.
//!
//! The protocol has two phases, driven by the application:
//!
//! 1. **start** - as soon as the application begins running, spawn one
//!    background thread that runs every registered initializer in order
//! 2. **await** - before declaring the application ready, block until that
//!    thread is done
//!
//! Warm-up is an optimisation only, so the protocol never fails:
//!
//! - An initializer that returns an error or panics is skipped; the next one runs
//! - If the thread cannot be spawned, nothing runs early and await returns at once
//! - If the awaiting thread is interrupted, await returns and the interruption
//!   stays pending on that thread
//!
//! ## Key Components
//!
//! * [`PreinitCoordinator`] - owns the worker and exposes `start` / `await_initialization`
//! * [`Initializer`] and [`InitializerSet`] - the ordered warm-up operations
//! * [`WorkerHandle`] and [`Spawner`] - the background thread and how it is created
//! * [`interrupt`] - thread-scoped interruption used by the blocking wait
//! * [`lifecycle`] - event glue for bootstraps that publish lifecycle events
//!
//! # Example
//!
//! ```rust
//! use std::sync::LazyLock;
//! use preinit::{InitializerSet, PreinitCoordinator, initializer};
//!
//! static STOP_WORDS: LazyLock<Vec<&'static str>> =
//!     LazyLock::new(|| vec!["a", "an", "the"]);
//!
//! let coordinator = PreinitCoordinator::builder()
//!     .from_env()
//!     .initializers(|| {
//!         InitializerSet::new()
//!             .with(initializer::force("stop-words", &STOP_WORDS))
//!             .with(initializer::from_fn("templates", || {
//!                 // compile templates, fill caches, ...
//!                 Ok(())
//!             }))
//!     })
//!     .build();
//!
//! coordinator.start();
//!
//! // ... the rest of bootstrap runs here, concurrently with warm-up ...
//!
//! coordinator.await_initialization();
//! ```
//!
//! ## Configuration
//!
//! See [`PreinitBuilder`]. Setting the `PREINIT_IGNORE` environment variable to
//! a true value turns warm-up off when the builder is created with
//! [`PreinitBuilder::from_env`].
//!
//! ## Logging
//!
//! Swallowed failures are reported through [`tracing`] at debug level. The
//! crate never installs a subscriber.

mod config;
mod coordinator;
mod error;
mod slot;

pub mod initializer;
pub mod interrupt;
pub mod lifecycle;
pub mod worker;

pub use config::{IGNORE_ENV, InitializerFactory, PreinitBuilder, PreinitConfig};
pub use coordinator::{CoordinatorState, PreinitCoordinator};
pub use error::{BoxError, PreinitError};
pub use initializer::{BoxedInitializer, Initializer, InitializerSet};
pub use lifecycle::{LifecycleEvent, LifecycleListener};
pub use worker::{Spawner, ThreadSpawner, WorkerHandle, WorkerOptions};
