//! IPC module for daemon-client communication
//!
//! Length-prefixed JSON over a Unix domain socket. Clients query status,
//! toggle features and subscribe to monitor events.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::Server;
