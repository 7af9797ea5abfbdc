//! Left-Option + Left-Shift chord (Korean <-> Japanese)
//!
//! Observes flags-changed events only and never withholds anything. The set
//! of held chord keys is rebuilt from each key's own device bit; a flag
//! transition for any other key clears it, since an intervening keystroke
//! invalidates a chord in progress.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::FeatureGate;
use crate::input_source::{InputSourceDirectory, ToggleEngine};
use crate::keyboard::{codes, Disposition, EventKind, EventProcessor, KeyEvent};

pub struct ModifierChordListener<D: InputSourceDirectory> {
    toggle: Arc<ToggleEngine<D>>,
    gate: FeatureGate,
    /// Key codes of the chord keys currently believed held
    pressed: HashSet<u16>,
    /// Set once the chord fired, until one of its keys is released
    latched: bool,
}

impl<D: InputSourceDirectory> ModifierChordListener<D> {
    pub fn new(toggle: Arc<ToggleEngine<D>>, gate: FeatureGate) -> Self {
        Self {
            toggle,
            gate,
            pressed: HashSet::new(),
            latched: false,
        }
    }

    /// Chord keys currently believed held
    pub fn pressed(&self) -> &HashSet<u16> {
        &self.pressed
    }

    fn on_flags_changed(&mut self, event: &KeyEvent) {
        let held = match event.key_code {
            codes::LEFT_OPTION => event.modifiers.left_option,
            codes::LEFT_SHIFT => event.modifiers.left_shift,
            _ => {
                if !self.pressed.is_empty() {
                    debug!(key_code = event.key_code, "unrelated key, chord cleared");
                }
                self.pressed.clear();
                return;
            }
        };

        if held {
            self.pressed.insert(event.key_code);
        } else {
            self.pressed.remove(&event.key_code);
            self.latched = false;
        }

        let complete = self.pressed.contains(&codes::LEFT_OPTION)
            && self.pressed.contains(&codes::LEFT_SHIFT);
        if !complete || event.modifiers.has_command_or_control() {
            return;
        }

        if self.latched {
            debug!("chord still held, already fired");
        } else {
            info!("left option + left shift chord detected");
            self.toggle.toggle_korean_japanese();
            self.latched = true;
        }
        self.pressed.clear();
    }
}

impl<D: InputSourceDirectory> EventProcessor for ModifierChordListener<D> {
    fn process(&mut self, event: &KeyEvent) -> Disposition {
        match event.kind {
            EventKind::FlagsChanged if self.gate.is_enabled() => self.on_flags_changed(event),
            EventKind::TapDisabled(_) => self.reset(),
            _ => {}
        }
        Disposition::Pass
    }

    fn reset(&mut self) {
        self.pressed.clear();
        self.latched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::test_support::{mods, LEFT_OPTION, LEFT_SHIFT, RIGHT_SHIFT};
    use crate::input_source::testing::FakeDirectory;
    use crate::input_source::{JAPANESE_SOURCE_ID, KOREAN_SOURCE_ID};
    use crate::keyboard::{masks, DisableCause};
    use tokio::sync::broadcast;

    fn listener() -> (ModifierChordListener<FakeDirectory>, FakeDirectory, FeatureGate) {
        let directory = FakeDirectory::new(&[KOREAN_SOURCE_ID, JAPANESE_SOURCE_ID]);
        directory.set_current(KOREAN_SOURCE_ID);
        let (tx, _rx) = broadcast::channel(16);
        let toggle = Arc::new(ToggleEngine::new(directory.clone(), tx));
        let gate = FeatureGate::new(true);
        (
            ModifierChordListener::new(toggle, gate.clone()),
            directory,
            gate,
        )
    }

    fn flags(key_code: u16, bits: u64) -> KeyEvent {
        KeyEvent::flags_changed(key_code, mods(bits))
    }

    #[test]
    fn test_option_then_shift_fires_once() {
        let (mut listener, directory, _) = listener();

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        assert_eq!(listener.pressed().len(), 1);
        listener.process(&flags(codes::LEFT_SHIFT, LEFT_OPTION | LEFT_SHIFT));

        assert_eq!(directory.selections(), vec![JAPANESE_SOURCE_ID.to_string()]);
        assert!(listener.pressed().is_empty());
    }

    #[test]
    fn test_duplicate_pressed_events_do_not_refire() {
        let (mut listener, directory, _) = listener();
        let both = LEFT_OPTION | LEFT_SHIFT;

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        listener.process(&flags(codes::LEFT_SHIFT, both));
        for _ in 0..3 {
            listener.process(&flags(codes::LEFT_SHIFT, both));
            listener.process(&flags(codes::LEFT_OPTION, both));
        }

        assert_eq!(directory.selections().len(), 1);
    }

    #[test]
    fn test_release_and_repress_fires_again() {
        let (mut listener, directory, _) = listener();

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        listener.process(&flags(codes::LEFT_SHIFT, LEFT_OPTION | LEFT_SHIFT));
        listener.process(&flags(codes::LEFT_SHIFT, LEFT_OPTION));
        listener.process(&flags(codes::LEFT_OPTION, 0));

        listener.process(&flags(codes::LEFT_SHIFT, LEFT_SHIFT));
        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION | LEFT_SHIFT));

        assert_eq!(
            directory.selections(),
            vec![
                JAPANESE_SOURCE_ID.to_string(),
                KOREAN_SOURCE_ID.to_string()
            ]
        );
    }

    #[test]
    fn test_command_or_control_suppresses_trigger() {
        for disqualifier in [masks::COMMAND, masks::CONTROL] {
            let (mut listener, directory, _) = listener();

            listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION | disqualifier));
            listener.process(&flags(
                codes::LEFT_SHIFT,
                LEFT_OPTION | LEFT_SHIFT | disqualifier,
            ));

            assert!(directory.selections().is_empty());
        }
    }

    #[test]
    fn test_command_pressed_mid_chord_clears_state() {
        let (mut listener, directory, _) = listener();

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        listener.process(&flags(codes::LEFT_COMMAND, LEFT_OPTION | masks::COMMAND));
        assert!(listener.pressed().is_empty());

        listener.process(&flags(
            codes::LEFT_SHIFT,
            LEFT_OPTION | LEFT_SHIFT | masks::COMMAND,
        ));
        assert!(directory.selections().is_empty());
    }

    #[test]
    fn test_right_shift_is_unrelated() {
        let (mut listener, directory, _) = listener();

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        listener.process(&flags(codes::RIGHT_SHIFT, LEFT_OPTION | RIGHT_SHIFT));

        assert!(listener.pressed().is_empty());
        assert!(directory.selections().is_empty());
    }

    #[test]
    fn test_pressed_set_follows_transitions() {
        let (mut listener, _, _) = listener();

        listener.process(&flags(codes::LEFT_SHIFT, LEFT_SHIFT));
        assert!(listener.pressed().contains(&codes::LEFT_SHIFT));

        listener.process(&flags(codes::LEFT_SHIFT, 0));
        assert!(listener.pressed().is_empty());

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        assert_eq!(
            listener.pressed().iter().copied().collect::<Vec<_>>(),
            vec![codes::LEFT_OPTION]
        );
    }

    #[test]
    fn test_disabled_gate_ignores_chord() {
        let (mut listener, directory, gate) = listener();
        gate.set(false);

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        listener.process(&flags(codes::LEFT_SHIFT, LEFT_OPTION | LEFT_SHIFT));

        assert!(directory.selections().is_empty());
        assert!(listener.pressed().is_empty());
    }

    #[test]
    fn test_tap_disabled_resets_state() {
        let (mut listener, directory, _) = listener();

        listener.process(&flags(codes::LEFT_OPTION, LEFT_OPTION));
        let disposition = listener.process(&KeyEvent::tap_disabled(DisableCause::Timeout));
        assert_eq!(disposition, Disposition::Pass);
        assert!(listener.pressed().is_empty());

        // The option press before the disable no longer counts
        listener.process(&flags(codes::LEFT_SHIFT, LEFT_OPTION | LEFT_SHIFT));
        assert!(directory.selections().is_empty());
    }

    #[test]
    fn test_never_suppresses() {
        let (mut listener, _, _) = listener();
        let events = [
            flags(codes::LEFT_OPTION, LEFT_OPTION),
            flags(codes::LEFT_SHIFT, LEFT_OPTION | LEFT_SHIFT),
            KeyEvent::key_down(codes::SPACE, mods(LEFT_SHIFT)),
        ];
        for event in events {
            assert_eq!(listener.process(&event), Disposition::Pass);
        }
    }
}
