//! # Initializers
//!
//! An initializer is a zero-argument warm-up operation that performs a side
//! effect (forcing a lazy static, loading a table, building a codec registry)
//! and may fail. Its outcome is never reported: a failing initializer only
//! means the same work will happen lazily later on the normal code path.
//!
//! Initializers are collected into an ordered [`InitializerSet`] and executed
//! one after another by the background worker. Each invocation is isolated with
//! [`run_safely`], so neither an `Err` nor a panic stops the remaining ones.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use crate::error::{BoxError, PreinitError};

/// A single warm-up operation.
///
/// # Implementation Notes
///
/// Implementations should:
/// * Be idempotent, since the same work may also be triggered lazily elsewhere
/// * Avoid touching state owned by the coordinator
/// * Prefer returning `Err` over panicking, although both are tolerated
///
/// # Example
///
/// ```
/// use preinit::{BoxError, Initializer};
///
/// struct TimezoneTable;
///
/// impl Initializer for TimezoneTable {
///     fn name(&self) -> &str {
///         "timezone-table"
///     }
///
///     fn run(&mut self) -> Result<(), BoxError> {
///         // load and cache the table
///         Ok(())
///     }
/// }
/// ```
pub trait Initializer: Send {
    /// Human-readable name used in log output.
    fn name(&self) -> &str;

    /// Performs the warm-up side effect.
    fn run(&mut self) -> Result<(), BoxError>;
}

/// A type-erased initializer as stored in an [`InitializerSet`].
pub type BoxedInitializer = Box<dyn Initializer>;

/// Adapts a closure into an [`Initializer`].
pub struct FnInitializer<F> {
    name: String,
    f: F,
}

impl<F> Initializer for FnInitializer<F>
where
    F: FnMut() -> Result<(), BoxError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> Result<(), BoxError> {
        (self.f)()
    }
}

/// Creates an initializer from a named closure.
///
/// # Parameters
///
/// * `name` - Name used when logging the outcome
/// * `f` - The warm-up operation
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnInitializer<F>
where
    F: FnMut() -> Result<(), BoxError> + Send,
{
    FnInitializer {
        name: name.into(),
        f,
    }
}

/// Creates an initializer that forces a lazily-initialized static.
///
/// This is the usual way to pull expensive one-time construction (parsers,
/// lookup tables, registries) off the request path.
///
/// ```
/// use std::sync::LazyLock;
/// use preinit::initializer;
///
/// static TABLE: LazyLock<Vec<u64>> = LazyLock::new(|| (0..1024).collect());
///
/// let warm = initializer::force("table", &TABLE);
/// ```
pub fn force<T>(name: impl Into<String>, lazy: &'static LazyLock<T>) -> impl Initializer
where
    T: Send + Sync + 'static,
{
    from_fn(name, move || {
        LazyLock::force(lazy);
        Ok(())
    })
}

/// Runs one initializer, converting both `Err` returns and panics into a
/// [`PreinitError`].
pub(crate) fn invoke(initializer: &mut dyn Initializer) -> Result<(), PreinitError> {
    match panic::catch_unwind(AssertUnwindSafe(|| initializer.run())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(PreinitError::Initializer {
            name: initializer.name().to_string(),
            source,
        }),
        Err(payload) => Err(PreinitError::Panicked {
            name: initializer.name().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Runs one initializer and discards any failure.
///
/// Failures are logged at debug level and go no further. A panic is caught
/// here, but the process-wide panic hook still runs first, so the default hook
/// prints the panic message to stderr. Hosts that want warm-up panics to stay
/// silent must install their own hook with [`std::panic::set_hook`].
pub fn run_safely(initializer: &mut dyn Initializer) {
    match invoke(initializer) {
        Ok(()) => {
            tracing::trace!(initializer = initializer.name(), "warm-up initializer completed")
        }
        Err(err) => tracing::debug!(error = %err, "ignoring warm-up initializer failure"),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An ordered sequence of initializers.
///
/// Order of registration is order of execution. Adding or removing a warm-up
/// step is a matter of editing the sequence.
#[derive(Default)]
pub struct InitializerSet {
    initializers: Vec<BoxedInitializer>,
}

impl InitializerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an initializer, builder style.
    pub fn with<I>(mut self, initializer: I) -> Self
    where
        I: Initializer + 'static,
    {
        self.push(initializer);
        self
    }

    /// Appends an initializer.
    pub fn push<I>(&mut self, initializer: I)
    where
        I: Initializer + 'static,
    {
        self.initializers.push(Box::new(initializer));
    }

    pub fn len(&self) -> usize {
        self.initializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
    }

    /// Names of the registered initializers, in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.initializers.iter().map(|initializer| initializer.name())
    }

    /// Runs every initializer in order, isolating each from the others'
    /// failures.
    pub fn run_all(self) {
        for mut initializer in self.initializers {
            run_safely(initializer.as_mut());
        }
    }
}

impl FromIterator<BoxedInitializer> for InitializerSet {
    fn from_iter<T: IntoIterator<Item = BoxedInitializer>>(iter: T) -> Self {
        Self {
            initializers: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for InitializerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
