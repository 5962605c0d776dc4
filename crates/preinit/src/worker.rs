//! Module for managing the background warm-up worker.
//!
//! A worker is one dedicated OS thread. Its body is wrapped so that a
//! completion signal fires when the body returns, however it returns, and a
//! [`WorkerHandle`] lets another thread wait for that signal either by blocking
//! (interruptibly) or from async code.

use std::fmt;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, Thread};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::PreinitError;
use crate::interrupt;

/// Default name of the warm-up thread.
pub const DEFAULT_THREAD_NAME: &str = "background-preinit";

/// The closure executed on the worker thread.
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Thread parameters handed to a [`Spawner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Name given to the spawned thread
    pub name: String,

    /// Stack size override, `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

/// Launches worker threads.
///
/// The default [`ThreadSpawner`] uses [`std::thread::Builder`]. Hosts where
/// thread creation is restricted, or tests that need to simulate that, can
/// supply their own implementation.
pub trait Spawner: Send + Sync {
    /// Spawns `body` on a new thread configured by `options`.
    ///
    /// # Returns
    ///
    /// The join handle of the new thread, or the I/O error reported by the
    /// platform when the thread could not be created
    fn spawn(&self, options: &WorkerOptions, body: WorkerBody) -> io::Result<JoinHandle<()>>;
}

/// Spawns workers as named OS threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, options: &WorkerOptions, body: WorkerBody) -> io::Result<JoinHandle<()>> {
        // `thread::Builder::spawn` panics on an interior NUL instead of erroring
        if options.name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread name must not contain NUL bytes",
            ));
        }

        let mut builder = thread::Builder::new().name(options.name.clone());
        if let Some(size) = options.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(body)
    }
}

/// One-shot completion signal shared between the worker and its waiter.
struct Completion {
    /// Set once the worker body has returned or unwound
    done: AtomicBool,

    /// Threads currently parked in `wait`
    waiters: Mutex<Vec<Thread>>,

    /// Wakes async waiters
    notify: Notify,
}

impl Completion {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn signal(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
        for waiter in self.waiters.lock().drain(..) {
            waiter.unpark();
        }
    }

    /// Blocks the calling thread until the signal fires.
    ///
    /// Returns [`PreinitError::Interrupted`] if the calling thread is
    /// interrupted first. The interruption flag is consumed in that case, the
    /// caller decides whether to raise it again.
    fn wait(&self) -> Result<(), PreinitError> {
        if self.is_done() {
            return Ok(());
        }

        // Registered before the loop re-checks `done`, so a concurrent signal
        // either sees this thread or is seen by it.
        let current = thread::current();
        self.waiters.lock().push(current.clone());

        let result = loop {
            if self.is_done() {
                break Ok(());
            }
            if interrupt::take() {
                break Err(PreinitError::Interrupted);
            }
            thread::park();
        };

        self.waiters.lock().retain(|waiter| waiter.id() != current.id());
        result
    }

    async fn wait_async(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }
}

/// Fires the completion signal when dropped.
///
/// Moved into the worker body so the signal fires on normal return and during
/// unwinding alike. A waiter can never be left parked on a worker that died.
struct CompletionGuard {
    completion: Arc<Completion>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::debug!("warm-up worker unwinding; signalling completion");
        }
        self.completion.signal();
    }
}

/// A handle to a running warm-up worker.
///
/// Waiting goes through [`wait`](WorkerHandle::wait) or
/// [`wait_async`](WorkerHandle::wait_async); both take `&self` so the handle can
/// stay published while a caller blocks on it. Dropping the handle without
/// waiting detaches the thread and the worker keeps running to completion.
pub struct WorkerHandle {
    /// Signal fired when the worker body finishes
    completion: Arc<Completion>,

    /// OS thread handle, reaped by the first successful blocking wait
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Spawns `body` on a new worker thread.
    ///
    /// # Parameters
    ///
    /// * `spawner` - Strategy used to create the thread
    /// * `options` - Thread name and stack size
    /// * `body` - The work to run; completion is signalled when it returns or panics
    ///
    /// # Returns
    ///
    /// A handle to the running worker, or [`PreinitError::Spawn`] if the thread
    /// could not be created
    pub fn spawn<F>(
        spawner: &dyn Spawner,
        options: &WorkerOptions,
        body: F,
    ) -> Result<Self, PreinitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let guard = CompletionGuard {
            completion: completion.clone(),
        };

        let thread = spawner.spawn(
            options,
            Box::new(move || {
                let _guard = guard;
                body();
            }),
        )?;

        Ok(Self {
            completion,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Returns whether the worker body has finished.
    pub fn is_finished(&self) -> bool {
        self.completion.is_done()
    }

    /// Blocks until the worker body has finished.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the worker is done, or [`PreinitError::Interrupted`] if the
    /// calling thread was interrupted while waiting. In the latter case the
    /// worker keeps running and the calling thread's interruption flag is clear.
    pub fn wait(&self) -> Result<(), PreinitError> {
        self.completion.wait()?;

        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::debug!("warm-up worker thread ended with a panic");
            }
        }
        Ok(())
    }

    /// Waits for the worker body to finish without blocking the async runtime.
    ///
    /// The OS thread is not joined here; it exits right after signalling
    /// completion.
    pub async fn wait_async(&self) {
        self.completion.wait_async().await;
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let thread = self
            .thread
            .lock()
            .as_ref()
            .and_then(|t| t.thread().name().map(str::to_string));

        f.debug_struct("WorkerHandle")
            .field("finished", &self.is_finished())
            .field("thread", &thread)
            .finish()
    }
}
