//! Coordinator configuration and builder.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::coordinator::PreinitCoordinator;
use crate::error::PreinitError;
use crate::initializer::InitializerSet;
use crate::worker::{DEFAULT_THREAD_NAME, Spawner, ThreadSpawner, WorkerOptions};

/// Environment variable that turns background warm-up off when set to a true
/// value (`true`, `1`, `yes`, `on`).
pub const IGNORE_ENV: &str = "PREINIT_IGNORE";

/// Produces the initializers for one start/await cycle.
pub type InitializerFactory = Arc<dyn Fn() -> InitializerSet + Send + Sync>;

/// Settings controlling whether and how the warm-up worker is launched.
#[derive(Clone)]
pub struct PreinitConfig {
    /// When false, `start` behaves as if the worker could not be spawned
    pub(crate) enabled: bool,

    /// Warm-up is skipped on hosts with fewer available cores than this
    pub(crate) min_parallelism: usize,

    /// Name and stack size of the worker thread
    pub(crate) worker: WorkerOptions,

    /// Strategy used to create the worker thread
    pub(crate) spawner: Arc<dyn Spawner>,
}

impl Default for PreinitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_parallelism: 1,
            worker: WorkerOptions::default(),
            spawner: Arc::new(ThreadSpawner),
        }
    }
}

impl PreinitConfig {
    /// Default configuration with [`IGNORE_ENV`] applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_ignore(env::var(IGNORE_ENV).ok().as_deref());
        config
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn min_parallelism(&self) -> usize {
        self.min_parallelism
    }

    pub fn worker_options(&self) -> &WorkerOptions {
        &self.worker
    }

    fn apply_ignore(&mut self, value: Option<&str>) {
        let Some(raw) = value else {
            return;
        };

        match parse_flag(raw) {
            Some(ignore) => self.enabled = !ignore,
            None => tracing::warn!(
                variable = IGNORE_ENV,
                value = raw,
                "unrecognised boolean, background warm-up stays enabled"
            ),
        }
    }

    /// Checks whether a worker may be launched on this host.
    pub(crate) fn check_launch(&self) -> Result<(), PreinitError> {
        if !self.enabled {
            return Err(PreinitError::Disabled("turned off by configuration"));
        }

        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if available < self.min_parallelism {
            return Err(PreinitError::Disabled("not enough available parallelism"));
        }

        Ok(())
    }
}

impl fmt::Debug for PreinitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreinitConfig")
            .field("enabled", &self.enabled)
            .field("min_parallelism", &self.min_parallelism)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Builder for [`PreinitCoordinator`].
///
/// # Example
///
/// ```
/// use preinit::{InitializerSet, PreinitCoordinator, initializer};
///
/// let coordinator = PreinitCoordinator::builder()
///     .thread_name("warmup")
///     .initializers(|| {
///         InitializerSet::new().with(initializer::from_fn("noop", || Ok(())))
///     })
///     .build();
///
/// coordinator.start();
/// coordinator.await_initialization();
/// ```
pub struct PreinitBuilder {
    config: PreinitConfig,
    initializers: InitializerFactory,
}

impl PreinitBuilder {
    /// Creates a builder with default settings and no initializers.
    pub fn new() -> Self {
        Self {
            config: PreinitConfig::default(),
            initializers: Arc::new(InitializerSet::new),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PreinitConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies [`IGNORE_ENV`] on top of the current settings.
    pub fn from_env(mut self) -> Self {
        self.config.apply_ignore(env::var(IGNORE_ENV).ok().as_deref());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker.name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size > 0, "stack_size must be > 0");

        self.config.worker.stack_size = Some(size);
        self
    }

    /// Skips warm-up on hosts reporting fewer than `n` available cores.
    pub fn min_parallelism(mut self, n: usize) -> Self {
        self.config.min_parallelism = n;
        self
    }

    /// Uses `spawner` to create the worker thread.
    pub fn spawner<S>(mut self, spawner: S) -> Self
    where
        S: Spawner + 'static,
    {
        self.config.spawner = Arc::new(spawner);
        self
    }

    /// Sets the factory producing the initializers for each cycle.
    pub fn initializers<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> InitializerSet + Send + Sync + 'static,
    {
        self.initializers = Arc::new(factory);
        self
    }

    pub fn build(self) -> PreinitCoordinator {
        PreinitCoordinator::from_parts(self.config, self.initializers)
    }
}

impl Default for PreinitBuilder {
    fn default() -> Self {
        Self::new()
    }
}
