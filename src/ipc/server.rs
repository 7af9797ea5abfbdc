//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications for
//! monitor events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::FeatureUpdate;
use crate::events::MonitorEvent;
use crate::monitor::MonitorHandle;

use super::protocol::{
    read_frame, write_frame, DaemonStatus, Notification, ProtocolError, Request, Response,
};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State shared by every client handler
struct ServerState {
    monitor: MonitorHandle,
    events: broadcast::Sender<MonitorEvent>,
    show_notification: RwLock<bool>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        monitor: MonitorHandle,
        events: broadcast::Sender<MonitorEvent>,
        show_notification: bool,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state: Arc::new(ServerState {
                monitor,
                events,
                show_notification: RwLock::new(show_notification),
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// Frames are read on a separate task so a subscribed client can receive
    /// pushes while no request is pending.
    async fn handle_client(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Request, ProtocolError>>(8);

        let reader_task = tokio::spawn(async move {
            loop {
                let (item, keep_reading) = match read_frame::<_, Request>(&mut reader).await {
                    Ok(Some(request)) => (Ok(request), true),
                    Ok(None) => break,
                    Err(ProtocolError::Json(e)) => (Err(ProtocolError::Json(e)), true),
                    Err(e) => (Err(e), false),
                };
                if request_tx.send(item).await.is_err() || !keep_reading {
                    break;
                }
            }
        });

        let mut events: Option<broadcast::Receiver<MonitorEvent>> = None;
        let result: Result<()> = loop {
            tokio::select! {
                item = request_rx.recv() => {
                    let request = match item {
                        None => {
                            debug!("client disconnected");
                            break Ok(());
                        }
                        Some(Ok(request)) => request,
                        Some(Err(ProtocolError::Json(e))) => {
                            warn!(%e, "invalid request");
                            let response = Response::error("invalid_request", e.to_string());
                            if let Err(e) = write_frame(&mut writer, &response).await {
                                break Err(e.into());
                            }
                            continue;
                        }
                        Some(Err(e)) => {
                            warn!(%e, "disconnecting client");
                            break Ok(());
                        }
                    };

                    debug!(?request, "received request");
                    let (response, subscribe) = Self::process_request(request, &state).await;
                    if subscribe && events.is_none() {
                        events = Some(state.events.subscribe());
                        debug!("client subscribed to notifications");
                    }
                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e.into());
                    }
                }
                event = next_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            if let Err(e) = Self::push_event(&mut writer, &state, event).await {
                                break Err(e.into());
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged behind monitor events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Forward one monitor event, plus a toast when notifications are on
    async fn push_event(
        writer: &mut OwnedWriteHalf,
        state: &ServerState,
        event: MonitorEvent,
    ) -> Result<(), ProtocolError> {
        let toast = if *state.show_notification.read().await {
            event.toast_message()
        } else {
            None
        };

        write_frame(writer, &Notification::Event { event }).await?;
        if let Some(message) = toast {
            write_frame(writer, &Notification::Toast { message }).await?;
        }
        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, state: &ServerState) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let response = match state.monitor.status().await {
                    Ok(monitor) => Response::Status(Self::daemon_status(state, monitor).await),
                    Err(e) => Response::error("monitor_unavailable", e.to_string()),
                };
                (response, false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            Request::SetFeatures {
                chord_toggle,
                shift_space_toggle,
            } => {
                let update = FeatureUpdate {
                    chord_toggle,
                    shift_space_toggle,
                };
                info!(?update, "features changed via IPC");
                let response = match state.monitor.update_features(update).await {
                    Ok(monitor) => Response::Status(Self::daemon_status(state, monitor).await),
                    Err(e) => Response::error("monitor_unavailable", e.to_string()),
                };
                (response, false)
            }

            Request::SetNotifications { enabled } => {
                *state.show_notification.write().await = enabled;
                info!(enabled, "notifications changed via IPC");
                (Response::NotificationsSet { enabled }, false)
            }
        }
    }

    async fn daemon_status(
        state: &ServerState,
        monitor: crate::monitor::MonitorStatus,
    ) -> DaemonStatus {
        let show_notification = *state.show_notification.read().await;
        DaemonStatus::new(
            monitor,
            show_notification,
            state.start_time.elapsed().as_secs(),
        )
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; never resolves for the others
async fn next_event(
    events: &mut Option<broadcast::Receiver<MonitorEvent>>,
) -> Result<MonitorEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
