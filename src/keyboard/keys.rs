//! Key code and modifier flag definitions
//!
//! Provides the macOS virtual key codes the chord listeners care about and
//! a struct describing which modifiers an event reports as held.

/// macOS virtual key codes (`kVK_*`)
pub mod codes {
    /// Space bar
    pub const SPACE: u16 = 0x31;
    /// Left Command
    pub const LEFT_COMMAND: u16 = 0x37;
    /// Right Command
    pub const RIGHT_COMMAND: u16 = 0x36;
    /// Left Shift
    pub const LEFT_SHIFT: u16 = 0x38;
    /// Right Shift
    pub const RIGHT_SHIFT: u16 = 0x3C;
    /// Left Option/Alt
    pub const LEFT_OPTION: u16 = 0x3A;
    /// Right Option/Alt
    pub const RIGHT_OPTION: u16 = 0x3D;
    /// Left Control
    pub const LEFT_CONTROL: u16 = 0x3B;
    /// Right Control
    pub const RIGHT_CONTROL: u16 = 0x3E;
}

/// Raw modifier flag masks shared by `CGEventFlags` and `NSEventModifierFlags`
pub mod masks {
    /// Either Shift key
    pub const SHIFT: u64 = 0x0002_0000;
    /// Either Control key
    pub const CONTROL: u64 = 0x0004_0000;
    /// Either Option/Alt key
    pub const OPTION: u64 = 0x0008_0000;
    /// Either Command key
    pub const COMMAND: u64 = 0x0010_0000;

    // Device-dependent bits (IOKit NX_DEVICE*KEYMASK)

    /// Left Shift only
    pub const DEVICE_LEFT_SHIFT: u64 = 0x0000_0002;
    /// Right Shift only
    pub const DEVICE_RIGHT_SHIFT: u64 = 0x0000_0004;
    /// Left Option only
    pub const DEVICE_LEFT_OPTION: u64 = 0x0000_0020;
}

/// Modifiers asserted on a single keyboard event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Either Shift key is held
    pub shift: bool,
    /// Specifically the left-hand Shift key is held
    pub left_shift: bool,
    /// Either Option key is held
    pub option: bool,
    /// Specifically the left-hand Option key is held
    pub left_option: bool,
    /// Either Control key is held
    pub control: bool,
    /// Either Command key is held
    pub command: bool,
}

impl ModifierState {
    /// Decode raw event flag bits
    pub fn from_raw(bits: u64) -> Self {
        Self {
            shift: bits & masks::SHIFT != 0,
            left_shift: bits & masks::DEVICE_LEFT_SHIFT != 0,
            option: bits & masks::OPTION != 0,
            left_option: bits & masks::DEVICE_LEFT_OPTION != 0,
            control: bits & masks::CONTROL != 0,
            command: bits & masks::COMMAND != 0,
        }
    }

    /// Check if no modifiers are held at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Command or Control disqualifies the Option+Shift chord
    pub fn has_command_or_control(&self) -> bool {
        self.command || self.control
    }

    /// Command, Control or Option disqualifies the Shift+Space chord
    pub fn has_command_control_or_option(&self) -> bool {
        self.command || self.control || self.option
    }
}
