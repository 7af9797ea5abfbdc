//! Text Input Sources (Carbon TIS) directory

use std::ffi::c_void;
use std::ptr;

use core_foundation::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFRelease, CFRetain, CFTypeRef, TCFType};
use core_foundation::string::{CFString, CFStringRef};
use tracing::warn;

use super::{InputSource, InputSourceDirectory, InputSourceError};

type TISInputSourceRef = *const c_void;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    fn TISCreateInputSourceList(properties: *const c_void, include_all_installed: u8) -> CFArrayRef;
    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> *const c_void;
    fn TISSelectInputSource(source: TISInputSourceRef) -> i32;
    static kTISPropertyInputSourceID: CFStringRef;
}

/// A retained `TISInputSourceRef` and its identifier
pub struct TisSource {
    raw: TISInputSourceRef,
    id: String,
}

// TIS sources are immutable CF objects; retain/release are thread-safe
unsafe impl Send for TisSource {}
unsafe impl Sync for TisSource {}

impl TisSource {
    /// Wrap a source the caller does not own
    ///
    /// # Safety
    /// `raw` must be a valid `TISInputSourceRef`.
    unsafe fn retain(raw: TISInputSourceRef) -> Option<Self> {
        let id = source_id(raw)?;
        CFRetain(raw as CFTypeRef);
        Some(Self { raw, id })
    }
}

impl Clone for TisSource {
    fn clone(&self) -> Self {
        unsafe {
            CFRetain(self.raw as CFTypeRef);
        }
        Self {
            raw: self.raw,
            id: self.id.clone(),
        }
    }
}

impl Drop for TisSource {
    fn drop(&mut self) {
        unsafe {
            CFRelease(self.raw as CFTypeRef);
        }
    }
}

impl InputSource for TisSource {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Read `kTISPropertyInputSourceID`
///
/// # Safety
/// `raw` must be a valid `TISInputSourceRef`.
unsafe fn source_id(raw: TISInputSourceRef) -> Option<String> {
    let value = TISGetInputSourceProperty(raw, kTISPropertyInputSourceID);
    if value.is_null() {
        return None;
    }
    Some(CFString::wrap_under_get_rule(value as CFStringRef).to_string())
}

/// The system's enabled input sources
#[derive(Debug, Default)]
pub struct TisDirectory;

impl TisDirectory {
    pub fn new() -> Self {
        Self
    }
}

impl InputSourceDirectory for TisDirectory {
    type Source = TisSource;

    fn sources(&self) -> Vec<TisSource> {
        unsafe {
            let list = TISCreateInputSourceList(ptr::null(), 0);
            if list.is_null() {
                warn!("TISCreateInputSourceList returned null");
                return Vec::new();
            }

            let count = CFArrayGetCount(list);
            let sources = (0..count)
                .filter_map(|index| {
                    let raw = CFArrayGetValueAtIndex(list, index);
                    if raw.is_null() {
                        None
                    } else {
                        TisSource::retain(raw)
                    }
                })
                .collect();

            CFRelease(list as CFTypeRef);
            sources
        }
    }

    fn current_id(&self) -> Option<String> {
        unsafe {
            let current = TISCopyCurrentKeyboardInputSource();
            if current.is_null() {
                return None;
            }
            let id = source_id(current);
            CFRelease(current as CFTypeRef);
            id
        }
    }

    fn select(&self, source: &TisSource) -> Result<(), InputSourceError> {
        let status = unsafe { TISSelectInputSource(source.raw) };
        if status != 0 {
            return Err(InputSourceError::SelectFailed {
                id: source.id.clone(),
                status,
            });
        }
        Ok(())
    }
}
