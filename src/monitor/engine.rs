//! Monitor implementation
//!
//! Owns the listeners and applies feature changes. Lives on the main thread,
//! which also runs the taps' run loop, and drains [`MonitorCommand`]s between
//! loop turns; everything else talks to it through a [`MonitorHandle`].

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::listener::{ListenerKind, ListenerSlot, ListenerStatus};
use crate::chord::{AlertGuard, FeatureGate, ModifierChordListener, ShiftSpaceListener};
use crate::config::{FeatureFlags, FeatureUpdate};
use crate::events::MonitorEvent;
use crate::input_source::{InputSourceDirectory, ToggleEngine};
use crate::keyboard::{EventSource, SharedProcessor};

/// Snapshot of the monitor for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub features: FeatureFlags,
    pub listeners: Vec<ListenerStatus>,
    /// Identifier of the active input source, if the OS reports one
    pub current_source: Option<String>,
}

/// Requests handled by [`Monitor::handle`]
#[derive(Debug)]
pub enum MonitorCommand {
    UpdateFeatures {
        update: FeatureUpdate,
        reply: oneshot::Sender<MonitorStatus>,
    },
    GetStatus {
        reply: oneshot::Sender<MonitorStatus>,
    },
}

/// The monitor has stopped taking commands
#[derive(Debug, thiserror::Error)]
#[error("monitor is no longer running")]
pub struct MonitorGone;

impl<T> From<mpsc::error::SendError<T>> for MonitorGone {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        MonitorGone
    }
}

impl From<oneshot::error::RecvError> for MonitorGone {
    fn from(_: oneshot::error::RecvError) -> Self {
        MonitorGone
    }
}

/// Cloneable front end to a running monitor
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Create a handle and the receiver to pass to [`Monitor::drain`]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<MonitorCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorGone> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(MonitorCommand::GetStatus { reply }).await?;
        Ok(rx.await?)
    }

    pub async fn update_features(
        &self,
        update: FeatureUpdate,
    ) -> Result<MonitorStatus, MonitorGone> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MonitorCommand::UpdateFeatures { update, reply })
            .await?;
        Ok(rx.await?)
    }
}

/// Owns the chord listeners and keeps their taps in line with the features
pub struct Monitor<D, S>
where
    D: InputSourceDirectory + 'static,
    S: EventSource,
{
    source: S,
    toggle: Arc<ToggleEngine<D>>,
    features: FeatureFlags,
    chord_gate: FeatureGate,
    shift_space_gate: FeatureGate,
    modifier_chord: ListenerSlot,
    shift_space: ListenerSlot,
    alert_guard: ListenerSlot,
    event_tx: broadcast::Sender<MonitorEvent>,
}

impl<D, S> Monitor<D, S>
where
    D: InputSourceDirectory + 'static,
    S: EventSource,
{
    /// Build the monitor with every listener stopped and every feature off
    ///
    /// Call [`Monitor::sync`] to apply the configured features.
    pub fn new(directory: D, source: S, event_tx: broadcast::Sender<MonitorEvent>) -> Self {
        let toggle = Arc::new(ToggleEngine::new(directory, event_tx.clone()));
        let chord_gate = FeatureGate::new(false);
        let shift_space_gate = FeatureGate::new(false);

        let modifier: SharedProcessor = Arc::new(Mutex::new(ModifierChordListener::new(
            Arc::clone(&toggle),
            chord_gate.clone(),
        )));
        let shift_space: SharedProcessor = Arc::new(Mutex::new(ShiftSpaceListener::new(
            Arc::clone(&toggle),
            shift_space_gate.clone(),
        )));
        let guard: SharedProcessor =
            Arc::new(Mutex::new(AlertGuard::new(shift_space_gate.clone())));

        Self {
            source,
            toggle,
            features: FeatureFlags {
                chord_toggle: false,
                shift_space_toggle: false,
            },
            chord_gate,
            shift_space_gate,
            modifier_chord: ListenerSlot::new(ListenerKind::ModifierChord, modifier),
            shift_space: ListenerSlot::new(ListenerKind::ShiftSpace, shift_space),
            alert_guard: ListenerSlot::new(ListenerKind::AlertGuard, guard),
            event_tx,
        }
    }

    /// Bring gates, taps and cached sources in line with `features`
    pub fn sync(&mut self, features: FeatureFlags) {
        info!(
            chord_toggle = features.chord_toggle,
            shift_space_toggle = features.shift_space_toggle,
            "syncing features"
        );
        self.features = features;
        self.chord_gate.set(features.chord_toggle);
        self.shift_space_gate.set(features.shift_space_toggle);

        if features.chord_toggle {
            self.start(ListenerKind::ModifierChord);
        } else {
            self.stop(ListenerKind::ModifierChord);
        }

        if features.shift_space_toggle {
            self.toggle.refresh_cache();
            self.start(ListenerKind::ShiftSpace);
            self.start(ListenerKind::AlertGuard);
        } else {
            self.stop(ListenerKind::ShiftSpace);
            self.stop(ListenerKind::AlertGuard);
            self.toggle.clear_cache();
        }
    }

    /// Install a listener's tap. No-op if it is already running.
    pub fn start(&mut self, kind: ListenerKind) {
        let slot = match kind {
            ListenerKind::ModifierChord => &mut self.modifier_chord,
            ListenerKind::ShiftSpace => &mut self.shift_space,
            ListenerKind::AlertGuard => &mut self.alert_guard,
        };
        slot.start(&self.source, &self.event_tx);
    }

    /// Remove a listener's tap. No-op if it is not running.
    pub fn stop(&mut self, kind: ListenerKind) {
        let slot = match kind {
            ListenerKind::ModifierChord => &mut self.modifier_chord,
            ListenerKind::ShiftSpace => &mut self.shift_space,
            ListenerKind::AlertGuard => &mut self.alert_guard,
        };
        slot.stop(&self.event_tx);
    }

    pub fn stop_all(&mut self) {
        for kind in ListenerKind::ALL {
            self.stop(kind);
        }
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            features: self.features,
            listeners: vec![
                self.modifier_chord.status(),
                self.shift_space.status(),
                self.alert_guard.status(),
            ],
            current_source: self.toggle.current_id(),
        }
    }

    /// Apply one command and answer it
    pub fn handle(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::UpdateFeatures { update, reply } => {
                debug!(?update, "feature update requested");
                let features = self.features.with(update);
                self.sync(features);
                let _ = reply.send(self.status());
            }
            MonitorCommand::GetStatus { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Handle every queued command without blocking
    ///
    /// Returns `false` once every [`MonitorHandle`] is gone.
    pub fn drain(&mut self, commands: &mut mpsc::Receiver<MonitorCommand>) -> bool {
        loop {
            match commands.try_recv() {
                Ok(command) => self.handle(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    info!("all monitor handles dropped");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::input_source::testing::FakeDirectory;
    use crate::input_source::{JAPANESE_SOURCE_ID, KOREAN_SOURCE_ID};
    use crate::keyboard::testing::FakeEventSource;
    use crate::keyboard::{codes, masks, DisableCause, Disposition, KeyEvent, ModifierState};
    use crate::monitor::ListenerState;

    const ABC: &str = "com.apple.keylayout.ABC";
    const LEFT_SHIFT: u64 = masks::SHIFT | masks::DEVICE_LEFT_SHIFT;
    const LEFT_OPTION: u64 = masks::OPTION | masks::DEVICE_LEFT_OPTION;

    type TestMonitor = Monitor<FakeDirectory, FakeEventSource>;

    fn monitor() -> (
        TestMonitor,
        FakeDirectory,
        FakeEventSource,
        broadcast::Receiver<MonitorEvent>,
    ) {
        let directory = FakeDirectory::new(&[KOREAN_SOURCE_ID, JAPANESE_SOURCE_ID, ABC]);
        directory.set_current(KOREAN_SOURCE_ID);
        let source = FakeEventSource::default();
        let (tx, rx) = broadcast::channel(64);
        let monitor = Monitor::new(directory.clone(), source.clone(), tx);
        (monitor, directory, source, rx)
    }

    fn state_of(status: &MonitorStatus, kind: ListenerKind) -> ListenerState {
        status
            .listeners
            .iter()
            .find(|s| s.listener == kind)
            .map(|s| s.state)
            .unwrap()
    }

    fn only(chord: bool, shift_space: bool) -> FeatureFlags {
        FeatureFlags {
            chord_toggle: chord,
            shift_space_toggle: shift_space,
        }
    }

    #[test]
    fn test_new_monitor_has_nothing_installed() {
        let (monitor, _, source, _) = monitor();
        let status = monitor.status();
        for kind in ListenerKind::ALL {
            assert_eq!(state_of(&status, kind), ListenerState::Stopped);
        }
        assert_eq!(source.installs(), 0);
        assert_eq!(status.current_source.as_deref(), Some(KOREAN_SOURCE_ID));
    }

    #[test]
    fn test_sync_installs_enabled_listeners() {
        let (mut monitor, _, source, mut rx) = monitor();
        monitor.sync(FeatureFlags::default());

        for kind in ListenerKind::ALL {
            assert!(source.is_installed(kind.name()), "{kind} not installed");
        }
        assert_eq!(
            source.request("alert-guard"),
            Some(ListenerKind::AlertGuard.tap_request())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            MonitorEvent::ListenerStarted {
                listener: ListenerKind::ModifierChord
            }
        );
    }

    #[test]
    fn test_sync_only_chord() {
        let (mut monitor, _, source, _) = monitor();
        monitor.sync(only(true, false));

        assert!(source.is_installed("modifier-chord"));
        assert!(!source.is_installed("shift-space"));
        assert!(!source.is_installed("alert-guard"));
    }

    #[test]
    fn test_repeated_sync_does_not_reinstall() {
        let (mut monitor, _, source, _) = monitor();
        monitor.sync(FeatureFlags::default());
        monitor.sync(FeatureFlags::default());
        assert_eq!(source.installs(), 3);
    }

    #[test]
    fn test_disabling_removes_taps() {
        let (mut monitor, _, source, _) = monitor();
        monitor.sync(FeatureFlags::default());
        monitor.sync(only(true, false));

        assert!(!source.is_installed("shift-space"));
        assert!(!source.is_installed("alert-guard"));
        assert_eq!(source.removals(), 2);
        assert_eq!(
            state_of(&monitor.status(), ListenerKind::ShiftSpace),
            ListenerState::Stopped
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut monitor, _, source, _) = monitor();
        monitor.stop(ListenerKind::ShiftSpace);

        monitor.sync(FeatureFlags::default());
        monitor.stop(ListenerKind::ShiftSpace);
        monitor.stop(ListenerKind::ShiftSpace);
        assert_eq!(source.removals(), 1);

        monitor.stop_all();
        monitor.stop_all();
        assert_eq!(source.removals(), 3);
    }

    #[test]
    fn test_permission_denied_leaves_listener_unavailable() {
        let (mut monitor, _, source, mut rx) = monitor();
        source.deny("shift-space");
        monitor.sync(only(false, true));

        let status = monitor.status();
        assert_eq!(
            state_of(&status, ListenerKind::ShiftSpace),
            ListenerState::Unavailable
        );
        assert_eq!(
            state_of(&status, ListenerKind::AlertGuard),
            ListenerState::Running
        );
        match rx.try_recv().unwrap() {
            MonitorEvent::ListenerUnavailable { listener, reason } => {
                assert_eq!(listener, ListenerKind::ShiftSpace);
                assert!(reason.contains("permissions"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // An explicit start tries again
        source.allow("shift-space");
        monitor.start(ListenerKind::ShiftSpace);
        assert!(source.is_installed("shift-space"));
    }

    #[test]
    fn test_shift_space_end_to_end() {
        let (mut monitor, directory, source, _) = monitor();
        monitor.sync(FeatureFlags::default());

        let shift = ModifierState::from_raw(LEFT_SHIFT);
        source.send(
            "shift-space",
            KeyEvent::flags_changed(codes::LEFT_SHIFT, shift),
        );
        assert_eq!(
            source.send("shift-space", KeyEvent::key_down(codes::SPACE, shift)),
            Some(Disposition::Suppress)
        );
        assert_eq!(directory.current().as_deref(), Some(ABC));
        assert_eq!(
            source.send("shift-space", KeyEvent::key_up(codes::SPACE, shift)),
            Some(Disposition::Suppress)
        );

        assert_eq!(
            source.send("alert-guard", KeyEvent::key_down(codes::SPACE, shift)),
            Some(Disposition::Suppress)
        );
    }

    #[test]
    fn test_modifier_chord_end_to_end() {
        let (mut monitor, directory, source, _) = monitor();
        monitor.sync(only(true, false));

        source.send(
            "modifier-chord",
            KeyEvent::flags_changed(codes::LEFT_OPTION, ModifierState::from_raw(LEFT_OPTION)),
        );
        let disposition = source.send(
            "modifier-chord",
            KeyEvent::flags_changed(
                codes::LEFT_SHIFT,
                ModifierState::from_raw(LEFT_OPTION | LEFT_SHIFT),
            ),
        );
        assert_eq!(disposition, Some(Disposition::Pass));
        assert_eq!(directory.current().as_deref(), Some(JAPANESE_SOURCE_ID));
    }

    #[test]
    fn test_restart_begins_with_clean_state() {
        let (mut monitor, directory, source, _) = monitor();
        monitor.sync(only(true, false));

        source.send(
            "modifier-chord",
            KeyEvent::flags_changed(codes::LEFT_OPTION, ModifierState::from_raw(LEFT_OPTION)),
        );
        monitor.sync(only(false, false));
        monitor.sync(only(true, false));

        source.send(
            "modifier-chord",
            KeyEvent::flags_changed(
                codes::LEFT_SHIFT,
                ModifierState::from_raw(LEFT_OPTION | LEFT_SHIFT),
            ),
        );
        assert!(directory.selections().is_empty());
    }

    #[test]
    fn test_stale_cached_source_passes_space() {
        let (mut monitor, directory, source, _) = monitor();
        monitor.sync(FeatureFlags::default());
        directory.uninstall(ABC);

        let shift = ModifierState::from_raw(LEFT_SHIFT);
        source.send(
            "shift-space",
            KeyEvent::flags_changed(codes::LEFT_SHIFT, shift),
        );
        assert_eq!(
            source.send("shift-space", KeyEvent::key_down(codes::SPACE, shift)),
            Some(Disposition::Pass)
        );
        assert_eq!(
            source.send("shift-space", KeyEvent::key_up(codes::SPACE, shift)),
            Some(Disposition::Pass)
        );
        assert_eq!(directory.current().as_deref(), Some(KOREAN_SOURCE_ID));
    }

    #[test]
    fn test_tap_disabled_reenables_and_resets_chord() {
        let (mut monitor, directory, source, _) = monitor();
        monitor.sync(only(true, false));

        source.send(
            "modifier-chord",
            KeyEvent::flags_changed(codes::LEFT_OPTION, ModifierState::from_raw(LEFT_OPTION)),
        );
        let disposition = source.send(
            "modifier-chord",
            KeyEvent::tap_disabled(DisableCause::Timeout),
        );
        assert_eq!(disposition, Some(Disposition::Pass));
        assert_eq!(source.reenables(), 1);

        // Left-Option was forgotten, so this is not a chord
        source.send(
            "modifier-chord",
            KeyEvent::flags_changed(
                codes::LEFT_SHIFT,
                ModifierState::from_raw(LEFT_OPTION | LEFT_SHIFT),
            ),
        );
        assert!(directory.selections().is_empty());
        assert_eq!(directory.current().as_deref(), Some(KOREAN_SOURCE_ID));
    }

    #[test]
    fn test_drain_without_commands_keeps_going() {
        let (mut monitor, _, _, _) = monitor();
        let (_handle, mut rx) = MonitorHandle::channel(1);
        assert!(monitor.drain(&mut rx));
    }

    #[test]
    fn test_drain_stops_when_handles_dropped() {
        let (mut monitor, _, _, _) = monitor();
        let (handle, mut rx) = MonitorHandle::channel(1);
        drop(handle);
        assert!(!monitor.drain(&mut rx));
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let (mut monitor, _, source, _) = monitor();
        monitor.sync(FeatureFlags::default());

        let (handle, mut rx) = MonitorHandle::channel(8);
        let driver = std::thread::spawn(move || {
            while monitor.drain(&mut rx) {
                std::thread::sleep(Duration::from_millis(1));
            }
            monitor
        });

        let status = handle
            .update_features(FeatureUpdate {
                chord_toggle: Some(false),
                shift_space_toggle: None,
            })
            .await
            .unwrap();
        assert!(!status.features.chord_toggle);
        assert!(status.features.shift_space_toggle);
        assert_eq!(
            state_of(&status, ListenerKind::ModifierChord),
            ListenerState::Stopped
        );
        assert!(!source.is_installed("modifier-chord"));

        let status = handle.status().await.unwrap();
        assert_eq!(
            state_of(&status, ListenerKind::ShiftSpace),
            ListenerState::Running
        );

        let second = handle.clone();
        drop(handle);
        drop(second);
        let mut monitor = driver.join().unwrap();
        monitor.stop_all();
        assert!(!source.is_installed("shift-space"));
    }

    #[tokio::test]
    async fn test_handle_reports_gone_monitor() {
        let (handle, rx) = MonitorHandle::channel(1);
        drop(rx);
        assert!(handle.status().await.is_err());
    }
}
