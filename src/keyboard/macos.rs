//! macOS event taps
//!
//! Session-wide taps use `CGEventTap` sources on the installing thread's
//! CFRunLoop. The in-process fallback uses an `NSEvent` local monitor.
//! Both only see events while that thread runs its loop; see
//! [`crate::lifecycle::MainLoop`].

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use block2::RcBlock;
use core_foundation::base::TCFType;
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use objc2::runtime::AnyObject;
use objc2::{class, msg_send};
use tracing::{debug, error, info};

use super::event::{DisableCause, Disposition, EventKind, KeyEvent};
use super::keys::ModifierState;
use super::tap::{
    deliver, dispatch, EventSource, SharedProcessor, TapError, TapHandle, TapMode, TapRequest,
    TapScope, WatchedKind,
};

extern "C" {
    fn CGEventTapEnable(tap: *mut c_void, enable: bool);
}

/// `NSEventMaskKeyDown`
const NS_EVENT_MASK_KEY_DOWN: u64 = 1 << 10;

/// Event source backed by CoreGraphics and AppKit
#[derive(Debug, Default)]
pub struct MacEventSource;

impl MacEventSource {
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for MacEventSource {
    fn install(
        &self,
        request: TapRequest,
        processor: SharedProcessor,
    ) -> Result<Box<dyn TapHandle>, TapError> {
        match request.scope {
            TapScope::Session => Ok(Box::new(SessionTap::install(request, processor)?)),
            TapScope::Local => Ok(Box::new(LocalMonitor::install(processor)?)),
        }
    }
}

/// A `CGEventTap` attached to the installing thread's run loop
///
/// Callbacks fire on that thread while its run loop is pumped, which for
/// the daemon is the main thread (TIS selection is only safe there).
struct SessionTap {
    name: &'static str,
    tap: Option<CGEventTap<'static>>,
    source: CFRunLoopSource,
    run_loop: CFRunLoop,
    port: Arc<AtomicPtr<c_void>>,
}

// Installed, pumped and removed on the main thread only
unsafe impl Send for SessionTap {}

impl SessionTap {
    fn install(request: TapRequest, processor: SharedProcessor) -> Result<Self, TapError> {
        let listener = request.name;
        let intercepting = request.mode == TapMode::Intercepting;
        let port = Arc::new(AtomicPtr::new(ptr::null_mut::<c_void>()));
        let callback_port = Arc::clone(&port);

        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
                             -> Option<CGEvent> {
            let Some(key_event) = translate(event_type, event) else {
                return Some(event.clone());
            };

            match deliver(listener, &processor, &key_event, || reenable(&callback_port)) {
                Disposition::Suppress if intercepting => {
                    event.set_type(CGEventType::Null);
                    None
                }
                _ => Some(event.clone()),
            }
        };

        let options = match request.mode {
            TapMode::ListenOnly => CGEventTapOptions::ListenOnly,
            TapMode::Intercepting => CGEventTapOptions::Default,
        };
        let event_types = request
            .kinds
            .iter()
            .map(|kind| match kind {
                WatchedKind::KeyDown => CGEventType::KeyDown,
                WatchedKind::KeyUp => CGEventType::KeyUp,
                WatchedKind::FlagsChanged => CGEventType::FlagsChanged,
            })
            .collect();

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            options,
            event_types,
            callback,
        )
        .map_err(|()| {
            error!(listener, "failed to create event tap - is the permission granted?");
            TapError::PermissionDenied { listener }
        })?;

        port.store(
            tap.mach_port.as_concrete_TypeRef() as *mut c_void,
            Ordering::SeqCst,
        );

        let source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|()| TapError::RunLoopSource { listener })?;
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&source, kCFRunLoopCommonModes);
        }

        tap.enable();
        info!(listener, intercepting, "event tap created and enabled");

        Ok(Self {
            name: listener,
            tap: Some(tap),
            source,
            run_loop,
            port,
        })
    }
}

impl TapHandle for SessionTap {
    fn remove(&mut self) {
        let Some(tap) = self.tap.take() else {
            return;
        };

        let raw = self.port.swap(ptr::null_mut(), Ordering::SeqCst);
        if !raw.is_null() {
            unsafe {
                CGEventTapEnable(raw, false);
            }
        }
        unsafe {
            self.run_loop.remove_source(&self.source, kCFRunLoopCommonModes);
        }
        // Releases the mach port and the boxed callback
        drop(tap);
        debug!(listener = self.name, "run loop source detached");
        info!(listener = self.name, "event tap removed");
    }
}

impl Drop for SessionTap {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Ask the OS to switch a disabled tap back on
fn reenable(port: &AtomicPtr<c_void>) {
    let raw = port.load(Ordering::SeqCst);
    if raw.is_null() {
        error!("cannot re-enable event tap: mach port unknown");
        return;
    }
    unsafe {
        CGEventTapEnable(raw, true);
    }
}

/// Translate a native tap event into a [`KeyEvent`]
fn translate(event_type: CGEventType, event: &CGEvent) -> Option<KeyEvent> {
    let kind = match event_type {
        CGEventType::KeyDown => EventKind::KeyDown,
        CGEventType::KeyUp => EventKind::KeyUp,
        CGEventType::FlagsChanged => EventKind::FlagsChanged,
        CGEventType::TapDisabledByTimeout => {
            return Some(KeyEvent::tap_disabled(DisableCause::Timeout))
        }
        CGEventType::TapDisabledByUserInput => {
            return Some(KeyEvent::tap_disabled(DisableCause::UserInput))
        }
        _ => return None,
    };

    Some(KeyEvent {
        kind,
        key_code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16,
        modifiers: ModifierState::from_raw(event.get_flags().bits()),
        is_repeat: event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0,
    })
}

/// An `NSEvent` local monitor for key-down events in this process
struct LocalMonitor {
    token: *mut AnyObject,
    _handler: RcBlock<dyn Fn(*mut AnyObject) -> *mut AnyObject>,
}

// The token is only handed back to AppKit in `remove`
unsafe impl Send for LocalMonitor {}

impl LocalMonitor {
    fn install(processor: SharedProcessor) -> Result<Self, TapError> {
        let handler = RcBlock::new(move |event: *mut AnyObject| -> *mut AnyObject {
            if event.is_null() {
                return event;
            }
            let key_event = unsafe { translate_ns_event(event) };
            match dispatch(&processor, &key_event) {
                Disposition::Suppress => ptr::null_mut(),
                Disposition::Pass => event,
            }
        });

        let token: *mut AnyObject = unsafe {
            msg_send![
                class!(NSEvent),
                addLocalMonitorForEventsMatchingMask: NS_EVENT_MASK_KEY_DOWN,
                handler: &*handler
            ]
        };
        if token.is_null() {
            return Err(TapError::LocalMonitor);
        }

        info!("local key-down monitor installed");
        Ok(Self {
            token,
            _handler: handler,
        })
    }
}

impl TapHandle for LocalMonitor {
    fn remove(&mut self) {
        if self.token.is_null() {
            return;
        }
        unsafe {
            let _: () = msg_send![class!(NSEvent), removeMonitor: self.token];
        }
        self.token = ptr::null_mut();
        info!("local key-down monitor removed");
    }
}

impl Drop for LocalMonitor {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Read a key-down `NSEvent` into a [`KeyEvent`]
///
/// # Safety
/// `event` must point to a live key-down `NSEvent`.
unsafe fn translate_ns_event(event: *mut AnyObject) -> KeyEvent {
    let key_code: u16 = msg_send![event, keyCode];
    let flags: usize = msg_send![event, modifierFlags];
    let is_repeat: bool = msg_send![event, isARepeat];

    let mut key_event = KeyEvent::key_down(key_code, ModifierState::from_raw(flags as u64));
    key_event.is_repeat = is_repeat;
    key_event
}
