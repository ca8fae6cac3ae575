//! Asynchronous device events and fatal-removal monitoring.
//!
//! The event dispatcher is an external facility, injected at context
//! construction. It delivers device events on a thread it owns, so the
//! handler installed here does the minimum possible work: classify the
//! event, and for a fatal one flip the shared removal flag and drop the
//! registration. No hardware calls happen on the dispatcher thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// An asynchronous device event.
///
/// Only [`DeviceFatal`](Self::DeviceFatal) is actionable in this crate;
/// everything else is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncEvent {
    /// The device has become permanently unusable.
    DeviceFatal,
    /// A port transitioned to active.
    PortActive(u8),
    /// A port reported an error.
    PortError(u8),
    /// The GID table of a port changed.
    GidChange(u8),
    /// Any other event kind, carrying the provider's raw code.
    Other(u32),
}

/// Receiver of asynchronous device events.
///
/// Invoked on a thread owned by the event dispatcher; implementations
/// must not block.
pub trait AsyncEventHandler: Send + Sync {
    /// Handle one delivered event.
    fn handle_async_event(&self, event: AsyncEvent);
}

/// Event-registration capability provided by the external dispatch
/// facility.
///
/// The device context registers its async event fd here at construction
/// and unregisters before releasing any device resources.
pub trait EventDispatcher: Send + Sync {
    /// Start delivering events read from `fd` to `handler`.
    fn register(&self, fd: i32, handler: Arc<dyn AsyncEventHandler>);

    /// Stop delivering events for `fd`.
    ///
    /// Unregistering an fd that is not currently registered is a no-op.
    fn unregister(&self, fd: i32);
}

/// Two-state monitor: active until a fatal device event arrives, then
/// permanently removed.
///
/// Shared between the device context (which reads the flag on the caller
/// thread) and the dispatcher (which sets it on the callback thread).
pub(crate) struct RemovalMonitor {
    removed: Arc<AtomicBool>,
    dispatcher: Arc<dyn EventDispatcher>,
    fd: i32,
    unregistered: AtomicBool,
}

impl RemovalMonitor {
    /// Unregister from the dispatcher at most once, no matter how many
    /// of the fatal-event path and the teardown path run.
    fn unregister_once(&self) {
        if !self.unregistered.swap(true, Ordering::AcqRel) {
            self.dispatcher.unregister(self.fd);
        }
    }
}

impl AsyncEventHandler for RemovalMonitor {
    fn handle_async_event(&self, event: AsyncEvent) {
        match event {
            AsyncEvent::DeviceFatal => {
                // Release pairs with the Acquire load guarding
                // deregistration on the caller threads.
                self.removed.store(true, Ordering::Release);
                self.unregister_once();
            }
            other => {
                debug!(?other, "ignoring async device event");
            }
        }
    }
}

/// Scoped event registration.
///
/// Registers the removal monitor on construction and unregisters on
/// drop. Declared as the first field of the device context so event
/// delivery stops before any device resource is released.
pub(crate) struct EventRegistration {
    monitor: Arc<RemovalMonitor>,
}

impl EventRegistration {
    pub(crate) fn register(
        dispatcher: Arc<dyn EventDispatcher>,
        fd: i32,
        removed: Arc<AtomicBool>,
    ) -> Self {
        let monitor = Arc::new(RemovalMonitor {
            removed,
            dispatcher: dispatcher.clone(),
            fd,
            unregistered: AtomicBool::new(false),
        });
        dispatcher.register(fd, monitor.clone());
        Self { monitor }
    }
}

impl Drop for EventRegistration {
    fn drop(&mut self) {
        self.monitor.unregister_once();
    }
}
