//! Keyboard module for global keyboard event taps
//!
//! Defines the platform-neutral event model, the tap abstraction listeners
//! are installed through, and the HID key-state tracker. The macOS backend
//! uses CGEventTap and NSEvent local monitors.

mod event;
mod keys;
mod tap;
mod tracker;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(target_os = "macos"))]
mod unsupported;

#[cfg(test)]
pub(crate) mod testing;

pub use event::{DisableCause, Disposition, EventKind, KeyEvent};
pub use keys::{codes, masks, ModifierState};
pub use tap::{
    deliver, dispatch, reset, EventProcessor, EventSource, SharedProcessor, TapError, TapHandle, TapMode,
    TapRequest, TapScope, WatchedKind,
};
pub use tracker::{usage, DeviceId, HeldKeys, KeyStateTracker, KeyTransition, PhysicalKey};

/// The event source for the platform this daemon was built for
#[cfg(target_os = "macos")]
pub fn platform_event_source() -> macos::MacEventSource {
    macos::MacEventSource::new()
}

/// The event source for the platform this daemon was built for
#[cfg(not(target_os = "macos"))]
pub fn platform_event_source() -> unsupported::UnsupportedEventSource {
    unsupported::UnsupportedEventSource::new()
}
