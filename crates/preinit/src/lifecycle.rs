//! # Lifecycle events
//!
//! Glue between an application's bootstrap sequence and the
//! [`PreinitCoordinator`]. The bootstrap publishes [`LifecycleEvent`]s; the
//! coordinator reacts to two of them:
//!
//! * [`LifecycleEvent::Started`] launches warm-up
//! * [`LifecycleEvent::ContextRefreshed`] waits for it to finish
//!
//! Listeners are delivered events in ascending [`LifecycleListener::order`].
//! The coordinator sorts directly after the logging listener so that any
//! diagnostics emitted by initializers land in a configured subscriber.

use std::sync::Arc;

use crate::coordinator::PreinitCoordinator;

/// Order of the listener that configures logging.
pub const LOGGING_LISTENER_ORDER: i32 = i32::MIN + 20;

/// Order of the warm-up coordinator: immediately after logging.
pub const PREINIT_ORDER: i32 = LOGGING_LISTENER_ORDER + 1;

/// Phase boundaries of application bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The application object exists but nothing has run yet.
    Starting,
    /// The application has begun running its bootstrap.
    Started,
    /// All components are wired and initialised.
    ContextRefreshed,
    /// The application is ready to serve traffic.
    Ready,
    /// The application is shutting down.
    Closed,
}

/// Receives lifecycle events from the bootstrap sequence.
pub trait LifecycleListener: Send + Sync {
    /// Delivery order; lower values receive events first.
    fn order(&self) -> i32 {
        0
    }

    fn on_event(&self, event: &LifecycleEvent);
}

impl LifecycleListener for PreinitCoordinator {
    fn order(&self) -> i32 {
        PREINIT_ORDER
    }

    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Started => self.start(),
            LifecycleEvent::ContextRefreshed => self.await_initialization(),
            _ => {}
        }
    }
}

impl<L> LifecycleListener for Arc<L>
where
    L: LifecycleListener + ?Sized,
{
    fn order(&self) -> i32 {
        (**self).order()
    }

    fn on_event(&self, event: &LifecycleEvent) {
        (**self).on_event(event)
    }
}

/// Delivers `event` to every listener in ascending order.
///
/// Listeners with equal order keep their relative position.
pub fn dispatch(listeners: &[&dyn LifecycleListener], event: LifecycleEvent) {
    let mut ordered = listeners.to_vec();
    ordered.sort_by_key(|listener| listener.order());

    for listener in ordered {
        listener.on_event(&event);
    }
}
