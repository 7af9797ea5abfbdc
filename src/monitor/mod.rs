//! Monitor module for listener lifecycle management
//!
//! The monitor owns the three chord listeners, their tap handles and the
//! shared toggle engine. Feature flag changes are applied through
//! [`Monitor::sync`], which starts and stops listeners so the installed taps
//! always match the enabled features:
//! - chord toggle: the modifier chord tap
//! - shift-space toggle: the shift-space tap and the alert guard

mod engine;
mod listener;

pub use engine::{Monitor, MonitorCommand, MonitorGone, MonitorHandle, MonitorStatus};
pub use listener::{ListenerKind, ListenerState, ListenerStatus};
