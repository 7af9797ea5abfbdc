//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::FeatureFlags;
use crate::events::MonitorEvent;
use crate::monitor::{ListenerStatus, MonitorStatus};

/// Largest frame body either side will accept
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from client to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to monitor events
    Subscribe,

    /// Enable or disable gestures; omitted fields keep their value
    SetFeatures {
        #[serde(default)]
        chord_toggle: Option<bool>,
        #[serde(default)]
        shift_space_toggle: Option<bool>,
    },

    /// Turn toast pushes on or off
    SetNotifications { enabled: bool },
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Subscription confirmed
    Subscribed,

    /// Notification setting applied
    NotificationsSet { enabled: bool },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A monitor event occurred
    Event { event: MonitorEvent },

    /// Human-readable confirmation of an input source switch
    Toast { message: String },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Enabled gestures
    pub features: FeatureFlags,

    /// Whether toast pushes are on
    pub show_notification: bool,

    /// State of every listener
    pub listeners: Vec<ListenerStatus>,

    /// Identifier of the active input source
    pub current_source: Option<String>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn new(monitor: MonitorStatus, show_notification: bool, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            features: monitor.features,
            show_notification,
            listeners: monitor.listeners,
            current_source: monitor.current_source,
            uptime_secs,
        }
    }
}

/// Errors that can occur while reading or writing frames
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds the 1 MiB limit")]
    FrameTooLarge(usize),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one length-prefixed JSON message
///
/// Returns `Ok(None)` on a clean end of stream before the length prefix.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Write one length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }
    let len = (body.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
