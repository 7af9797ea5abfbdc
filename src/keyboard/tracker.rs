//! Key-state tracking for HID keyboard reports
//!
//! Keyboards report key state in two shapes: dedicated boolean elements
//! (the eight modifier keys) and array elements whose value is the usage of
//! whichever key is currently active. The tracker diffs array reports per
//! device so both shapes come out as discrete press/release transitions.
//!
//! This is a standalone component for a HID-report consumer. No chord
//! listener owns one: the listeners work from CGEvent flags. A consumer
//! that does own a tracker must call [`KeyStateTracker::clear`] when it
//! stops, the same way a listener is reset when its tap is removed.

use std::collections::{HashMap, HashSet};

/// HID keyboard/keypad page usages
pub mod usage {
    /// No key reported
    pub const NO_EVENT: u32 = 0x00;
    /// Too many keys held at once
    pub const ERROR_ROLLOVER: u32 = 0x01;
    pub const SPACEBAR: u32 = 0x2C;
    pub const LEFT_CONTROL: u32 = 0xE0;
    pub const LEFT_SHIFT: u32 = 0xE1;
    pub const LEFT_ALT: u32 = 0xE2;
    pub const LEFT_GUI: u32 = 0xE3;
    pub const RIGHT_CONTROL: u32 = 0xE4;
    pub const RIGHT_SHIFT: u32 = 0xE5;
    pub const RIGHT_ALT: u32 = 0xE6;
    pub const RIGHT_GUI: u32 = 0xE7;
}

/// Opaque identity of a reporting keyboard device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// A discrete press or release synthesized from a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub usage: u32,
    pub pressed: bool,
}

/// Per-device bookkeeping for array-style reports
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    devices: HashMap<DeviceId, HashSet<u32>>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn one report value into zero or more transitions
    pub fn on_report(
        &mut self,
        device: DeviceId,
        usage: u32,
        is_array: bool,
        value: i64,
    ) -> Vec<KeyTransition> {
        if is_array {
            return self.on_array_report(device, value);
        }

        if usage == usage::NO_EVENT || usage == usage::ERROR_ROLLOVER {
            return Vec::new();
        }

        vec![KeyTransition {
            usage,
            pressed: value != 0,
        }]
    }

    fn on_array_report(&mut self, device: DeviceId, value: i64) -> Vec<KeyTransition> {
        if value == i64::from(usage::NO_EVENT) {
            let Some(previous) = self.devices.remove(&device) else {
                return Vec::new();
            };
            let mut released: Vec<u32> = previous.into_iter().collect();
            released.sort_unstable();
            return released
                .into_iter()
                .map(|usage| KeyTransition {
                    usage,
                    pressed: false,
                })
                .collect();
        }

        let Ok(key) = u32::try_from(value) else {
            return Vec::new();
        };
        if key <= usage::ERROR_ROLLOVER {
            return Vec::new();
        }

        if self.devices.entry(device).or_default().insert(key) {
            vec![KeyTransition {
                usage: key,
                pressed: true,
            }]
        } else {
            Vec::new()
        }
    }

    /// Usages currently recorded as held on a device
    pub fn pressed_on(&self, device: DeviceId) -> Option<&HashSet<u32>> {
        self.devices.get(&device)
    }

    /// Forget every device
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

/// Physically distinguishable keys relevant to chord detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalKey {
    LeftShift,
    LeftOption,
    Space,
    LeftCommand,
    RightCommand,
    LeftControl,
    RightControl,
    RightOption,
}

impl PhysicalKey {
    pub fn from_usage(usage: u32) -> Option<Self> {
        match usage {
            usage::LEFT_SHIFT => Some(Self::LeftShift),
            usage::LEFT_ALT => Some(Self::LeftOption),
            usage::SPACEBAR => Some(Self::Space),
            usage::LEFT_GUI => Some(Self::LeftCommand),
            usage::RIGHT_GUI => Some(Self::RightCommand),
            usage::LEFT_CONTROL => Some(Self::LeftControl),
            usage::RIGHT_CONTROL => Some(Self::RightControl),
            usage::RIGHT_ALT => Some(Self::RightOption),
            _ => None,
        }
    }

    fn is_disqualifying_modifier(self) -> bool {
        !matches!(self, Self::LeftShift | Self::Space)
    }
}

/// Held/released status of the tracked physical keys
#[derive(Debug, Default)]
pub struct HeldKeys {
    held: HashSet<PhysicalKey>,
}

impl HeldKeys {
    /// Apply a transition; returns the key if it is one we track
    pub fn apply(&mut self, transition: KeyTransition) -> Option<PhysicalKey> {
        let key = PhysicalKey::from_usage(transition.usage)?;
        if transition.pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
        Some(key)
    }

    pub fn is_held(&self, key: PhysicalKey) -> bool {
        self.held.contains(&key)
    }

    /// Left Shift held and no Command/Control/Option on either side
    pub fn is_left_shift_only(&self) -> bool {
        self.is_held(PhysicalKey::LeftShift)
            && !self.held.iter().any(|key| key.is_disqualifying_modifier())
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}
