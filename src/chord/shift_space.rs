//! Space while only Left-Shift is held (Korean <-> Latin)
//!
//! Runs on an intercepting tap. When the gesture switches the input source
//! the Space key-down is swallowed, and so is its matching key-up, so
//! downstream consumers never see an unbalanced key.

use std::sync::Arc;

use tracing::{debug, trace};

use super::FeatureGate;
use crate::input_source::{InputSourceDirectory, ToggleEngine};
use crate::keyboard::{codes, Disposition, EventKind, EventProcessor, KeyEvent};

pub struct ShiftSpaceListener<D: InputSourceDirectory> {
    toggle: Arc<ToggleEngine<D>>,
    gate: FeatureGate,
    /// Device-level left shift bit from the last flags-changed event
    left_shift_held: bool,
    /// The last Space key-down was swallowed; its key-up must be too
    consumed_space_down: bool,
}

impl<D: InputSourceDirectory> ShiftSpaceListener<D> {
    pub fn new(toggle: Arc<ToggleEngine<D>>, gate: FeatureGate) -> Self {
        Self {
            toggle,
            gate,
            left_shift_held: false,
            consumed_space_down: false,
        }
    }

    pub fn left_shift_held(&self) -> bool {
        self.left_shift_held
    }

    pub fn consumed_space_down(&self) -> bool {
        self.consumed_space_down
    }

    fn on_space_down(&mut self, event: &KeyEvent) -> Disposition {
        if !self.gate.is_enabled()
            || event.is_repeat
            || !self.left_shift_held
            || event.modifiers.has_command_control_or_option()
        {
            return Disposition::Pass;
        }

        if self.toggle.toggle_korean_latin() {
            debug!("shift+space toggled input source, swallowing space");
            self.consumed_space_down = true;
            Disposition::Suppress
        } else {
            Disposition::Pass
        }
    }

    fn on_space_up(&mut self) -> Disposition {
        if self.consumed_space_down {
            self.consumed_space_down = false;
            Disposition::Suppress
        } else {
            Disposition::Pass
        }
    }
}

impl<D: InputSourceDirectory> EventProcessor for ShiftSpaceListener<D> {
    fn process(&mut self, event: &KeyEvent) -> Disposition {
        match event.kind {
            EventKind::FlagsChanged => {
                self.left_shift_held = event.modifiers.left_shift;
                Disposition::Pass
            }
            EventKind::KeyDown if event.key_code == codes::SPACE => self.on_space_down(event),
            EventKind::KeyUp if event.key_code == codes::SPACE => self.on_space_up(),
            EventKind::TapDisabled(cause) => {
                trace!(?cause, "tap disabled, keeping shift/space state");
                Disposition::Pass
            }
            _ => Disposition::Pass,
        }
    }

    fn reset(&mut self) {
        self.left_shift_held = false;
        self.consumed_space_down = false;
    }
}
