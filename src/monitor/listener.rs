//! Listener slots
//!
//! A slot pairs one listener's processor with the tap currently feeding it.
//! Starting a running slot and stopping a stopped one are both no-ops.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::MonitorEvent;
use crate::keyboard::{
    self, EventSource, SharedProcessor, TapHandle, TapMode, TapRequest, TapScope, WatchedKind,
};

/// The listeners the monitor manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    /// Left-Option + Left-Shift, listen-only session tap
    ModifierChord,
    /// Left-Shift + Space, intercepting session tap
    ShiftSpace,
    /// In-process fallback for Left-Shift + Space
    AlertGuard,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 3] = [
        ListenerKind::ModifierChord,
        ListenerKind::ShiftSpace,
        ListenerKind::AlertGuard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListenerKind::ModifierChord => "modifier-chord",
            ListenerKind::ShiftSpace => "shift-space",
            ListenerKind::AlertGuard => "alert-guard",
        }
    }

    /// How this listener's tap has to be installed
    pub fn tap_request(self) -> TapRequest {
        match self {
            ListenerKind::ModifierChord => TapRequest {
                name: self.name(),
                mode: TapMode::ListenOnly,
                scope: TapScope::Session,
                kinds: &[WatchedKind::FlagsChanged],
            },
            ListenerKind::ShiftSpace => TapRequest {
                name: self.name(),
                mode: TapMode::Intercepting,
                scope: TapScope::Session,
                kinds: &[
                    WatchedKind::KeyDown,
                    WatchedKind::KeyUp,
                    WatchedKind::FlagsChanged,
                ],
            },
            ListenerKind::AlertGuard => TapRequest {
                name: self.name(),
                mode: TapMode::Intercepting,
                scope: TapScope::Local,
                kinds: &[WatchedKind::KeyDown],
            },
        }
    }
}

impl std::fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    #[default]
    Stopped,
    Running,
    /// The last start failed; stays this way until the next start
    Unavailable,
}

/// One listener's state as reported over IPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStatus {
    pub listener: ListenerKind,
    pub state: ListenerState,
}

pub(crate) struct ListenerSlot {
    kind: ListenerKind,
    processor: SharedProcessor,
    handle: Option<Box<dyn TapHandle>>,
    state: ListenerState,
}

impl ListenerSlot {
    pub(crate) fn new(kind: ListenerKind, processor: SharedProcessor) -> Self {
        Self {
            kind,
            processor,
            handle: None,
            state: ListenerState::Stopped,
        }
    }

    pub(crate) fn status(&self) -> ListenerStatus {
        ListenerStatus {
            listener: self.kind,
            state: self.state,
        }
    }

    pub(crate) fn start(
        &mut self,
        source: &dyn EventSource,
        event_tx: &broadcast::Sender<MonitorEvent>,
    ) {
        if self.handle.is_some() {
            debug!(listener = %self.kind, "listener already running");
            return;
        }

        keyboard::reset(&self.processor);

        match source.install(self.kind.tap_request(), Arc::clone(&self.processor)) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = ListenerState::Running;
                info!(listener = %self.kind, "listener started");
                let _ = event_tx.send(MonitorEvent::ListenerStarted {
                    listener: self.kind,
                });
            }
            Err(e) => {
                self.state = ListenerState::Unavailable;
                warn!(listener = %self.kind, error = %e, "listener unavailable");
                let _ = event_tx.send(MonitorEvent::ListenerUnavailable {
                    listener: self.kind,
                    reason: e.to_string(),
                });
            }
        }
    }

    pub(crate) fn stop(&mut self, event_tx: &broadcast::Sender<MonitorEvent>) {
        let Some(mut handle) = self.handle.take() else {
            self.state = ListenerState::Stopped;
            return;
        };

        handle.remove();
        keyboard::reset(&self.processor);
        self.state = ListenerState::Stopped;
        info!(listener = %self.kind, "listener stopped");
        let _ = event_tx.send(MonitorEvent::ListenerStopped {
            listener: self.kind,
        });
    }
}
