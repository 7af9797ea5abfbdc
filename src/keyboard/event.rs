//! Platform-neutral keyboard events delivered to chord listeners

use super::keys::ModifierState;

/// Why the OS switched a tap off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableCause {
    /// A callback exceeded the OS latency budget
    Timeout,
    /// Secure input or the user disabled the tap
    UserInput,
}

/// Kind of keyboard event observed by a tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    FlagsChanged,
    /// The OS disabled the tap; it has to be re-enabled explicitly
    TapDisabled(DisableCause),
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::KeyDown => write!(f, "key_down"),
            EventKind::KeyUp => write!(f, "key_up"),
            EventKind::FlagsChanged => write!(f, "flags_changed"),
            EventKind::TapDisabled(cause) => write!(f, "tap_disabled({:?})", cause),
        }
    }
}

/// A single keyboard event, translated from the native event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: EventKind,
    /// Hardware (virtual) key code
    pub key_code: u16,
    /// Modifiers asserted when the event was generated
    pub modifiers: ModifierState,
    /// Auto-repeat key-down
    pub is_repeat: bool,
}

impl KeyEvent {
    pub fn key_down(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            kind: EventKind::KeyDown,
            key_code,
            modifiers,
            is_repeat: false,
        }
    }

    pub fn key_up(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            kind: EventKind::KeyUp,
            key_code,
            modifiers,
            is_repeat: false,
        }
    }

    pub fn flags_changed(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            kind: EventKind::FlagsChanged,
            key_code,
            modifiers,
            is_repeat: false,
        }
    }

    pub fn tap_disabled(cause: DisableCause) -> Self {
        Self {
            kind: EventKind::TapDisabled(cause),
            key_code: 0,
            modifiers: ModifierState::default(),
            is_repeat: false,
        }
    }

    /// Mark the event as an auto-repeat
    pub fn repeated(mut self) -> Self {
        self.is_repeat = true;
        self
    }
}

/// What a listener decided to do with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Deliver the event unmodified
    Pass,
    /// Withhold the event from every downstream consumer
    Suppress,
}
