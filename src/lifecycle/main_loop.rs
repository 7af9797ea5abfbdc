//! The main thread's event loop
//!
//! Session taps attach their sources to the main CFRunLoop and the
//! in-process guard is an AppKit local monitor, so neither sees a single
//! event unless the main thread keeps pumping. [`MainLoop::run_once`]
//! does one bounded turn of that loop.

use std::time::Duration;

#[cfg(target_os = "macos")]
pub use self::macos::MainLoop;

#[cfg(not(target_os = "macos"))]
pub use self::fallback::MainLoop;

#[cfg(target_os = "macos")]
mod macos {
    use std::time::Duration;

    use core_foundation::runloop::kCFRunLoopDefaultMode;
    use objc2::rc::autoreleasepool;
    use objc2::runtime::AnyObject;
    use objc2::{class, msg_send};
    use tracing::{debug, warn};

    /// `NSApplicationActivationPolicyAccessory`: no Dock icon, no menu bar
    const ACTIVATION_POLICY_ACCESSORY: isize = 1;

    /// `NSEventMaskAny`
    const NS_EVENT_MASK_ANY: usize = usize::MAX;

    /// The shared `NSApplication`, driven by hand
    pub struct MainLoop {
        app: *mut AnyObject,
    }

    impl MainLoop {
        /// Set up the shared application as a background accessory
        ///
        /// Must be called on the main thread before any tap is installed.
        pub fn new() -> Self {
            let app: *mut AnyObject = unsafe {
                let app: *mut AnyObject = msg_send![class!(NSApplication), sharedApplication];
                let accepted: bool =
                    msg_send![app, setActivationPolicy: ACTIVATION_POLICY_ACCESSORY];
                if !accepted {
                    warn!("NSApplication rejected the accessory activation policy");
                }
                let _: () = msg_send![app, finishLaunching];
                app
            };
            debug!("NSApplication ready");
            Self { app }
        }

        /// Wait up to `timeout` for one AppKit event and dispatch it
        ///
        /// Waiting runs the main CFRunLoop, which fires the tap sources;
        /// `sendEvent:` feeds the local monitors.
        pub fn run_once(&self, timeout: Duration) {
            autoreleasepool(|_| unsafe {
                let until: *mut AnyObject = msg_send![
                    class!(NSDate),
                    dateWithTimeIntervalSinceNow: timeout.as_secs_f64()
                ];
                let event: *mut AnyObject = msg_send![
                    self.app,
                    nextEventMatchingMask: NS_EVENT_MASK_ANY,
                    untilDate: until,
                    inMode: kCFRunLoopDefaultMode as *const AnyObject,
                    dequeue: true
                ];
                if !event.is_null() {
                    let _: () = msg_send![self.app, sendEvent: event];
                }
            });
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod fallback {
    use std::thread;
    use std::time::Duration;

    /// Nothing to pump without AppKit
    #[derive(Debug, Default)]
    pub struct MainLoop;

    impl MainLoop {
        pub fn new() -> Self {
            Self
        }

        pub fn run_once(&self, timeout: Duration) {
            thread::sleep(timeout);
        }
    }
}

/// Upper bound on one turn, so queued monitor commands are not starved
pub const MAIN_LOOP_SLICE: Duration = Duration::from_millis(50);
