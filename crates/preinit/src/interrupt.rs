//! # Thread interruption
//!
//! A cooperative, thread-scoped interruption flag.
//!
//! Every thread lazily owns one flag. Any holder of that thread's
//! [`InterruptHandle`] may raise it; raising the flag also unparks the thread so
//! a blocking wait built on [`std::thread::park`] wakes up and notices.
//!
//! Blocking waits in this crate follow a fixed discipline:
//!
//! 1. Before each park, [`take`] the flag. If it was set, abandon the wait.
//! 2. The caller that abandoned the wait re-raises the flag with
//!    `interrupt::current().interrupt()` so code further up the stack can still
//!    observe the request.
//!
//! ## Example
//!
//! ```
//! use std::thread;
//! use preinit::interrupt;
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let waiter = thread::spawn(move || {
//!     tx.send(interrupt::current()).unwrap();
//!     while !interrupt::is_interrupted() {
//!         thread::park();
//!     }
//! });
//!
//! rx.recv().unwrap().interrupt();
//! waiter.join().unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};

thread_local! {
    static CURRENT: InterruptHandle = InterruptHandle::for_thread(thread::current());
}

/// A handle that can interrupt one specific thread.
///
/// Handles are cheap to clone and may be sent to other threads.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    /// The thread to wake when the flag is raised
    thread: Thread,

    /// Pending interruption flag shared with the owning thread
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    fn for_thread(thread: Thread) -> Self {
        Self {
            thread,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raises the interruption flag of the target thread and unparks it.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
        self.thread.unpark();
    }

    /// Returns whether an interruption is pending on the target thread.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The thread this handle interrupts.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }
}

/// Returns the interrupt handle of the calling thread.
pub fn current() -> InterruptHandle {
    CURRENT.with(Clone::clone)
}

/// Returns whether the calling thread has a pending interruption.
///
/// The flag is left untouched.
pub fn is_interrupted() -> bool {
    CURRENT.with(InterruptHandle::is_interrupted)
}

/// Clears the calling thread's interruption flag, returning its previous value.
pub fn take() -> bool {
    CURRENT.with(|handle| handle.flag.swap(false, Ordering::AcqRel))
}

/// Clears the calling thread's interruption flag.
pub fn clear() {
    take();
}
