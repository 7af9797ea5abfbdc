//! In-process fallback for the Shift+Space gesture
//!
//! The intercepting tap's suppression does not reach every consumer inside
//! this process, and an unhandled Shift+Space here produces an alert beep.
//! The guard applies the same Space/left-shift/modifier test to key-downs
//! seen by the local monitor and swallows matches. It performs no toggle and
//! reads left shift from the event itself instead of sharing the tap
//! listener's state.

use tracing::trace;

use super::FeatureGate;
use crate::keyboard::{codes, Disposition, EventKind, EventProcessor, KeyEvent};

#[derive(Debug, Clone)]
pub struct AlertGuard {
    gate: FeatureGate,
}

impl AlertGuard {
    pub fn new(gate: FeatureGate) -> Self {
        Self { gate }
    }

    fn is_shift_space(event: &KeyEvent) -> bool {
        event.key_code == codes::SPACE
            && !event.is_repeat
            && event.modifiers.left_shift
            && !event.modifiers.has_command_control_or_option()
    }
}

impl EventProcessor for AlertGuard {
    fn process(&mut self, event: &KeyEvent) -> Disposition {
        if event.kind == EventKind::KeyDown && self.gate.is_enabled() && Self::is_shift_space(event)
        {
            trace!("swallowing shift+space in local event path");
            return Disposition::Suppress;
        }
        Disposition::Pass
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::test_support::{mods, LEFT_OPTION, LEFT_SHIFT, RIGHT_SHIFT};
    use crate::keyboard::masks;

    #[test]
    fn test_swallows_left_shift_space() {
        let mut guard = AlertGuard::new(FeatureGate::new(true));
        let down = KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT));
        assert_eq!(guard.process(&down), Disposition::Suppress);
    }

    #[test]
    fn test_passes_everything_else() {
        let mut guard = AlertGuard::new(FeatureGate::new(true));
        let events = [
            KeyEvent::key_down(codes::SPACE, mods(0)),
            KeyEvent::key_down(codes::SPACE, mods(RIGHT_SHIFT)),
            KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT | masks::COMMAND)),
            KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT | masks::CONTROL)),
            KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT | LEFT_OPTION)),
            KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT)).repeated(),
            KeyEvent::key_down(0x00, mods(LEFT_SHIFT)),
            KeyEvent::key_up(codes::SPACE, mods(LEFT_SHIFT)),
        ];
        for event in events {
            assert_eq!(guard.process(&event), Disposition::Pass, "{event:?}");
        }
    }

    #[test]
    fn test_disabled_gate_passes() {
        let gate = FeatureGate::new(true);
        let mut guard = AlertGuard::new(gate.clone());
        gate.set(false);

        let down = KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT));
        assert_eq!(guard.process(&down), Disposition::Pass);
    }
}
