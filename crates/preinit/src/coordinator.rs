//! # Preinit coordinator
//!
//! Two-phase warm-up protocol driven by application lifecycle signals.
//!
//! ```text
//!   start()                       await_initialization()
//!      |                                  |
//!   Idle ──spawn ok──> Running ──worker done / wait interrupted──> Idle
//!      |
//!      └──spawn failed / disabled──> Idle (await returns at once)
//! ```
//!
//! `start` launches one background thread that runs every initializer in order,
//! each isolated from the others' failures. `await_initialization` blocks the
//! caller until that thread is done. Neither operation ever reports a failure:
//! warm-up is purely an optimisation, and anything it fails to do will happen
//! lazily on the normal code path instead.

use std::sync::Arc;

use crate::config::{InitializerFactory, PreinitBuilder, PreinitConfig};
use crate::error::PreinitError;
use crate::initializer::InitializerSet;
use crate::interrupt;
use crate::slot::WorkerSlot;
use crate::worker::WorkerHandle;

/// Observable state of a [`PreinitCoordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No worker is stored.
    Idle,
    /// A worker has been launched and not yet awaited.
    Running,
}

/// Runs warm-up initializers on a background thread between the "started" and
/// "ready" lifecycle signals.
///
/// # Example
///
/// ```
/// use std::sync::LazyLock;
/// use preinit::{InitializerSet, PreinitCoordinator, initializer};
///
/// static ROUTES: LazyLock<Vec<String>> = LazyLock::new(|| vec!["/".to_string()]);
///
/// let coordinator = PreinitCoordinator::new(|| {
///     InitializerSet::new()
///         .with(initializer::force("routes", &ROUTES))
///         .with(initializer::from_fn("codec", || Err("codec unavailable".into())))
/// });
///
/// coordinator.start();
/// // ... rest of bootstrap runs concurrently ...
/// coordinator.await_initialization();
/// ```
pub struct PreinitCoordinator {
    /// Launch settings
    config: PreinitConfig,

    /// Builds the initializer sequence for each cycle
    initializers: InitializerFactory,

    /// The in-flight worker, if any
    worker: WorkerSlot,
}

impl PreinitCoordinator {
    /// Creates a coordinator with default settings.
    ///
    /// # Parameters
    ///
    /// * `initializers` - Factory producing the ordered initializers; called
    ///   once per `start`
    pub fn new<F>(initializers: F) -> Self
    where
        F: Fn() -> InitializerSet + Send + Sync + 'static,
    {
        Self::from_parts(PreinitConfig::default(), Arc::new(initializers))
    }

    /// Returns a builder for a customised coordinator.
    pub fn builder() -> PreinitBuilder {
        PreinitBuilder::new()
    }

    pub(crate) fn from_parts(config: PreinitConfig, initializers: InitializerFactory) -> Self {
        Self {
            config,
            initializers,
            worker: WorkerSlot::new(),
        }
    }

    pub fn config(&self) -> &PreinitConfig {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        if self.worker.is_occupied() {
            CoordinatorState::Running
        } else {
            CoordinatorState::Idle
        }
    }

    /// Launches the background warm-up worker.
    ///
    /// Any failure to launch is logged at debug level and otherwise ignored; the
    /// coordinator then stays [`CoordinatorState::Idle`].
    pub fn start(&self) {
        if let Err(err) = self.launch() {
            tracing::debug!(error = %err, "background warm-up not started");
        }
    }

    fn launch(&self) -> Result<(), PreinitError> {
        self.config.check_launch()?;

        let initializers = (self.initializers)();
        let count = initializers.len();
        let handle = WorkerHandle::spawn(
            self.config.spawner.as_ref(),
            &self.config.worker,
            move || initializers.run_all(),
        )?;

        if self.worker.publish(handle).is_some() {
            tracing::warn!("warm-up restarted before being awaited; previous worker detached");
        }
        tracing::debug!(
            initializers = count,
            thread = %self.config.worker.name,
            "background warm-up started"
        );
        Ok(())
    }

    /// Blocks until the background worker has finished.
    ///
    /// Returns immediately if no worker is stored. If the calling thread is
    /// interrupted while waiting, the wait is abandoned and the interruption is
    /// raised again on the calling thread. The stored worker is cleared in
    /// every case.
    pub fn await_initialization(&self) {
        let Some(worker) = self.worker.current() else {
            return;
        };

        let outcome = worker.wait();
        self.worker.release(&worker);

        match outcome {
            Ok(()) => tracing::trace!("background warm-up finished"),
            Err(PreinitError::Interrupted) => {
                tracing::debug!("interrupted while awaiting background warm-up");
                interrupt::current().interrupt();
            }
            Err(err) => tracing::debug!(error = %err, "ignoring background warm-up wait failure"),
        }
    }

    /// Async variant of [`await_initialization`](Self::await_initialization)
    /// for bootstraps running on a tokio runtime.
    ///
    /// The runtime thread is never blocked. If the returned future is dropped
    /// before the worker finishes, the worker stays stored and a later await
    /// still waits for it.
    pub async fn await_initialization_async(&self) {
        let Some(worker) = self.worker.current() else {
            return;
        };

        worker.wait_async().await;
        self.worker.release(&worker);
        tracing::trace!("background warm-up finished");
    }
}

impl std::fmt::Debug for PreinitCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreinitCoordinator")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::initializer::from_fn;
    use crate::worker::{Spawner, ThreadSpawner, WorkerBody, WorkerOptions};
    use std::io;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, mpsc};
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct FailingSpawner;

    impl Spawner for FailingSpawner {
        fn spawn(&self, _options: &WorkerOptions, _body: WorkerBody) -> io::Result<JoinHandle<()>> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "threads are not allowed here"))
        }
    }

    /// Counts spawns and delegates to the real thread spawner.
    #[derive(Clone, Default)]
    struct CountingSpawner {
        spawned: Arc<AtomicUsize>,
    }

    impl Spawner for CountingSpawner {
        fn spawn(&self, options: &WorkerOptions, body: WorkerBody) -> io::Result<JoinHandle<()>> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            ThreadSpawner.spawn(options, body)
        }
    }

    fn step(name: &'static str, log: Log, fail: bool) -> impl crate::Initializer {
        from_fn(name, move || -> Result<(), BoxError> {
            log.lock().unwrap().push(name);
            if fail {
                Err(format!("{name} failed").into())
            } else {
                Ok(())
            }
        })
    }

    fn recording_coordinator(
        log: Log,
        outcomes: &'static [(&'static str, bool)],
    ) -> PreinitCoordinator {
        PreinitCoordinator::new(move || {
            outcomes.iter().fold(InitializerSet::new(), |set, &(name, fail)| {
                set.with(step(name, log.clone(), fail))
            })
        })
    }

    #[test]
    fn test_await_without_start_returns_immediately() {
        let coordinator = PreinitCoordinator::new(InitializerSet::new);

        let start = Instant::now();
        coordinator.await_initialization();

        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_runs_all_tasks_in_order_despite_failure() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let outcomes = &[("t1", false), ("t2", true), ("t3", false)];
        let coordinator = recording_coordinator(log.clone(), outcomes);

        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_every_task_invoked_once_when_all_fail() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let outcomes = &[("a", true), ("b", true), ("c", true), ("d", true)];
        let coordinator = recording_coordinator(log.clone(), outcomes);

        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_empty_initializer_set() {
        let coordinator = PreinitCoordinator::new(InitializerSet::new);

        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_panicking_task_does_not_stop_others() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let coordinator = PreinitCoordinator::new({
            let log = log.clone();
            move || {
                InitializerSet::new()
                    .with(from_fn("explodes", || -> Result<(), BoxError> {
                        panic!("bad provider")
                    }))
                    .with(step("after", log.clone(), false))
            }
        });

        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_await_blocks_until_worker_finishes() {
        let finished = Arc::new(AtomicUsize::new(0));
        let coordinator = PreinitCoordinator::new({
            let finished = finished.clone();
            move || {
                let finished = finished.clone();
                InitializerSet::new().with(from_fn("slow", move || {
                    thread::sleep(Duration::from_millis(150));
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
            }
        });

        let start = Instant::now();
        coordinator.start();
        assert_eq!(coordinator.state(), CoordinatorState::Running);
        coordinator.await_initialization();

        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawn_failure_runs_nothing() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let coordinator = PreinitCoordinator::builder()
            .spawner(FailingSpawner)
            .initializers({
                let log = log.clone();
                move || InitializerSet::new().with(step("never", log.clone(), false))
            })
            .build();

        coordinator.start();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        let start = Instant::now();
        coordinator.await_initialization();

        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_nul_thread_name_is_absorbed() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let coordinator = PreinitCoordinator::builder()
            .thread_name("warm\0up")
            .initializers({
                let log = log.clone();
                move || InitializerSet::new().with(step("never", log.clone(), false))
            })
            .build();

        let started = panic::catch_unwind(AssertUnwindSafe(|| coordinator.start()));
        assert!(started.is_ok());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        coordinator.await_initialization();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_second_start_replaces_previous_worker() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let spawner = CountingSpawner::default();
        let coordinator = PreinitCoordinator::builder()
            .spawner(spawner.clone())
            .initializers({
                let log = log.clone();
                move || {
                    let log = log.clone();
                    InitializerSet::new().with(from_fn("slow", move || {
                        thread::sleep(Duration::from_millis(50));
                        log.lock().unwrap().push("slow");
                        Ok(())
                    }))
                }
            })
            .build();

        coordinator.start();
        coordinator.start();
        assert_eq!(coordinator.state(), CoordinatorState::Running);

        coordinator.await_initialization();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 2);

        // The detached first worker still runs to completion
        let deadline = Instant::now() + Duration::from_secs(5);
        while log.lock().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*log.lock().unwrap(), vec!["slow", "slow"]);
    }

    #[test]
    fn test_disabled_coordinator_never_spawns() {
        let spawner = CountingSpawner::default();
        let coordinator = PreinitCoordinator::builder()
            .enabled(false)
            .spawner(spawner.clone())
            .build();

        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_repeated_await_is_noop() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let coordinator = recording_coordinator(log.clone(), &[("only", false)]);

        coordinator.start();
        coordinator.await_initialization();

        let start = Instant::now();
        coordinator.await_initialization();
        coordinator.await_initialization();

        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(*log.lock().unwrap(), vec!["only"]);
    }

    #[test]
    fn test_second_cycle_runs_again() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let spawner = CountingSpawner::default();
        let coordinator = PreinitCoordinator::builder()
            .spawner(spawner.clone())
            .initializers({
                let log = log.clone();
                move || InitializerSet::new().with(step("cycle", log.clone(), false))
            })
            .build();

        coordinator.start();
        coordinator.await_initialization();
        coordinator.start();
        coordinator.await_initialization();

        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 2);
        assert_eq!(*log.lock().unwrap(), vec!["cycle", "cycle"]);
    }

    #[test]
    fn test_interrupted_await_returns_and_keeps_flag() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let coordinator = Arc::new(PreinitCoordinator::new(move || {
            let release_rx = release_rx.clone();
            InitializerSet::new().with(from_fn("blocked", move || {
                let _ = release_rx.lock().unwrap().recv();
                Ok(())
            }))
        }));

        coordinator.start();

        let (handle_tx, handle_rx) = mpsc::channel();
        let waiter = thread::spawn({
            let coordinator = coordinator.clone();
            move || {
                handle_tx.send(interrupt::current()).unwrap();
                coordinator.await_initialization();
                interrupt::is_interrupted()
            }
        });

        thread::sleep(Duration::from_millis(50));
        handle_rx.recv().unwrap().interrupt();

        let still_interrupted = waiter.join().unwrap();
        assert!(still_interrupted);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_already_interrupted_thread_does_not_block() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let coordinator = PreinitCoordinator::new(move || {
            let release_rx = release_rx.clone();
            InitializerSet::new().with(from_fn("blocked", move || {
                let _ = release_rx.lock().unwrap().recv();
                Ok(())
            }))
        });

        coordinator.start();
        interrupt::current().interrupt();
        coordinator.await_initialization();

        assert!(interrupt::take());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        release_tx.send(()).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_await_async_waits_for_worker() {
        let finished = Arc::new(AtomicUsize::new(0));
        let coordinator = PreinitCoordinator::new({
            let finished = finished.clone();
            move || {
                let finished = finished.clone();
                InitializerSet::new().with(from_fn("slow", move || {
                    thread::sleep(Duration::from_millis(100));
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
            }
        });

        coordinator.start();
        coordinator.await_initialization_async().await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_dropped_async_await_keeps_worker() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let coordinator = PreinitCoordinator::new(move || {
            let release_rx = release_rx.clone();
            InitializerSet::new().with(from_fn("blocked", move || {
                let _ = release_rx.lock().unwrap().recv();
                Ok(())
            }))
        });

        coordinator.start();
        let pending = coordinator.await_initialization_async();
        let timed_out = tokio::time::timeout(Duration::from_millis(50), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(coordinator.state(), CoordinatorState::Running);

        release_tx.send(()).unwrap();
        coordinator.await_initialization_async().await;
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }
}
