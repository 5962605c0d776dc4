//! Single-slot exchange holding the in-flight worker handle.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::worker::WorkerHandle;

/// Holds at most one [`WorkerHandle`].
///
/// Publication, reads and clearing are atomic pointer exchanges; no lock is
/// taken. Waiters load the `Arc` out, wait on it, then release it.
pub(crate) struct WorkerSlot {
    handle: ArcSwapOption<WorkerHandle>,
}

impl WorkerSlot {
    pub(crate) fn new() -> Self {
        Self {
            handle: ArcSwapOption::empty(),
        }
    }

    /// Stores `handle`, returning whatever was stored before.
    pub(crate) fn publish(&self, handle: WorkerHandle) -> Option<Arc<WorkerHandle>> {
        self.handle.swap(Some(Arc::new(handle)))
    }

    /// Returns the stored handle without removing it.
    pub(crate) fn current(&self) -> Option<Arc<WorkerHandle>> {
        self.handle.load_full()
    }

    /// Empties the slot if it still holds `handle`.
    ///
    /// A handle published after `handle` was read is left in place.
    pub(crate) fn release(&self, handle: &Arc<WorkerHandle>) {
        let expected = Some(handle.clone());
        let _ = self.handle.compare_and_swap(&expected, None);
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.handle.load().is_some()
    }
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}
