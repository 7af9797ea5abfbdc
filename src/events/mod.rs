//! Events module for monitor notifications
//!
//! Provides structured event types for input source switches and listener
//! lifecycle changes. Events are broadcast to the IPC server, which pushes
//! them to subscribed clients.

use serde::{Deserialize, Serialize};

use crate::input_source::{display_name, TogglePolicy};
use crate::monitor::ListenerKind;

/// Events emitted by the monitor and the toggle engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A gesture switched the active input source
    SourceSwitched {
        policy: TogglePolicy,
        /// Identifier of the source that was active before
        from: String,
        /// Identifier of the source that is active now
        to: String,
    },

    /// A listener's tap was installed
    ListenerStarted { listener: ListenerKind },

    /// A listener's tap was removed
    ListenerStopped { listener: ListenerKind },

    /// A listener could not be started (usually a missing permission)
    ListenerUnavailable { listener: ListenerKind, reason: String },
}

impl MonitorEvent {
    /// Human-readable confirmation for switch events
    pub fn toast_message(&self) -> Option<String> {
        match self {
            MonitorEvent::SourceSwitched { to, .. } => {
                Some(format!("Input source: {}", display_name(to)))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorEvent::SourceSwitched { policy, from, to } => {
                write!(f, "SOURCE_SWITCHED {} ({} -> {})", policy, from, to)
            }
            MonitorEvent::ListenerStarted { listener } => {
                write!(f, "LISTENER_STARTED ({})", listener)
            }
            MonitorEvent::ListenerStopped { listener } => {
                write!(f, "LISTENER_STOPPED ({})", listener)
            }
            MonitorEvent::ListenerUnavailable { listener, reason } => {
                write!(f, "LISTENER_UNAVAILABLE ({}: {})", listener, reason)
            }
        }
    }
}
