//! Event tap abstraction
//!
//! A tap is a subscription to the OS keyboard event stream. Listeners never
//! talk to the OS directly: they implement [`EventProcessor`] and are handed
//! to an [`EventSource`], which owns the native subscription and feeds every
//! translated event through the processor.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{trace, warn};

use super::event::{Disposition, EventKind, KeyEvent};

/// The "process event -> pass/suppress" contract shared by every listener
pub trait EventProcessor: Send {
    /// Decide what to do with one event. Must not block.
    fn process(&mut self, event: &KeyEvent) -> Disposition;

    /// Drop all transient state so the next start begins clean
    fn reset(&mut self);
}

/// A listener shared between its owner and the tap callback
pub type SharedProcessor = Arc<Mutex<dyn EventProcessor>>;

/// Whether the tap may withhold events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapMode {
    /// Observe only; the callback's verdict is ignored
    ListenOnly,
    /// The callback decides whether the event continues downstream
    Intercepting,
}

/// Where the tap sits in the event distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapScope {
    /// Every process in the login session
    Session,
    /// Only the host process's own event path
    Local,
}

/// Event kinds a tap subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedKind {
    KeyDown,
    KeyUp,
    FlagsChanged,
}

/// Everything an event source needs to install one tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapRequest {
    pub name: &'static str,
    pub mode: TapMode,
    pub scope: TapScope,
    pub kinds: &'static [WatchedKind],
}

/// A live subscription. Dropping it must also remove it.
pub trait TapHandle: Send {
    /// Unregister from the OS. Calling it twice is a no-op.
    fn remove(&mut self);
}

/// Installs taps against the OS event distribution
pub trait EventSource: Send {
    fn install(
        &self,
        request: TapRequest,
        processor: SharedProcessor,
    ) -> Result<Box<dyn TapHandle>, TapError>;
}

/// Errors that can occur while installing a tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("failed to create {listener} event tap - check Accessibility / Input Monitoring permissions")]
    PermissionDenied { listener: &'static str },

    #[error("failed to create run loop source for {listener} event tap")]
    RunLoopSource { listener: &'static str },

    #[error("failed to install local event monitor")]
    LocalMonitor,

    #[error("event taps are not supported on this platform")]
    Unsupported,
}

/// Run an event through a processor from a tap callback
///
/// A poisoned lock is recovered rather than propagated: the callback has to
/// return a verdict no matter what.
pub fn dispatch(processor: &SharedProcessor, event: &KeyEvent) -> Disposition {
    let mut guard = processor.lock().unwrap_or_else(PoisonError::into_inner);
    let disposition = guard.process(event);
    trace!(kind = %event.kind, key_code = event.key_code, ?disposition, "event dispatched");
    disposition
}

/// Entry point for tap callbacks
///
/// The OS switches a tap off when a callback is too slow or user input
/// interferes; `reenable` switches it back on before the notification
/// reaches the processor.
pub fn deliver(
    listener: &str,
    processor: &SharedProcessor,
    event: &KeyEvent,
    reenable: impl FnOnce(),
) -> Disposition {
    if let EventKind::TapDisabled(cause) = event.kind {
        warn!(listener, ?cause, "event tap disabled by the system, re-enabling");
        reenable();
    }
    dispatch(processor, event)
}

/// Reset a processor outside the callback path
pub fn reset(processor: &SharedProcessor) {
    processor
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .reset();
}
