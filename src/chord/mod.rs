//! Chord listeners
//!
//! Three independent state machines, each implementing
//! [`EventProcessor`](crate::keyboard::EventProcessor):
//! - `ModifierChordListener`: Left-Option + Left-Shift, listen-only
//! - `ShiftSpaceListener`: Space while only Left-Shift is held, intercepting
//! - `AlertGuard`: in-process fallback that swallows the same Space press
//!
//! None of them share mutable state with another.

mod alert_guard;
mod modifier;
mod shift_space;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use alert_guard::AlertGuard;
pub use modifier::ModifierChordListener;
pub use shift_space::ShiftSpaceListener;

/// Administrative on/off switch for a feature, read on every gesture
#[derive(Debug, Clone, Default)]
pub struct FeatureGate(Arc<AtomicBool>);

impl FeatureGate {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::keyboard::{masks, ModifierState};

    pub fn mods(bits: u64) -> ModifierState {
        ModifierState::from_raw(bits)
    }

    pub const LEFT_SHIFT: u64 = masks::SHIFT | masks::DEVICE_LEFT_SHIFT;
    pub const RIGHT_SHIFT: u64 = masks::SHIFT | masks::DEVICE_RIGHT_SHIFT;
    pub const LEFT_OPTION: u64 = masks::OPTION | masks::DEVICE_LEFT_OPTION;
}
