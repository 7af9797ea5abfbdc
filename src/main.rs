//! kawa-daemon: keyboard chord engine for switching macOS input sources
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Left-Option + Left-Shift toggles Korean <-> Japanese (listen-only tap)
//! - Left-Shift + Space toggles Korean <-> Latin and swallows the Space
//!   (intercepting tap plus an in-process fallback)
//! - IPC server for status queries, feature toggles and switch notifications

mod chord;
mod config;
mod events;
mod input_source;
mod ipc;
mod keyboard;
mod lifecycle;
mod monitor;

use std::thread;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::MonitorEvent;
use crate::ipc::Server;
use crate::lifecycle::{MainLoop, ShutdownSignal, MAIN_LOOP_SLICE};
use crate::monitor::{ListenerState, Monitor, MonitorHandle};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "kawa-daemon starting");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        ?config.features,
        show_notification = config.show_notification,
        "configuration loaded"
    );

    // Toggle engine and listeners -> IPC subscribers and the log
    let (event_tx, _event_rx) = broadcast::channel::<MonitorEvent>(64);

    // The taps, the local monitor and every input source switch stay on
    // this thread. AppKit must be up before the first tap is installed.
    let main_loop = MainLoop::new();
    let mut monitor = Monitor::new(
        input_source::platform_directory(),
        keyboard::platform_event_source(),
        event_tx.clone(),
    );
    monitor.sync(config.features);

    let unavailable: Vec<_> = monitor
        .status()
        .listeners
        .into_iter()
        .filter(|l| l.state == ListenerState::Unavailable)
        .map(|l| l.listener)
        .collect();
    if !unavailable.is_empty() {
        warn!(
            ?unavailable,
            "continuing without some listeners - check Accessibility / Input Monitoring permissions"
        );
    }

    // IPC server talks to the monitor through its command channel
    let (monitor_handle, mut commands) = MonitorHandle::channel(16);

    // Async services run on their own runtime thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let service = thread::Builder::new()
        .name("kawa-service".into())
        .spawn(move || runtime.block_on(serve(config, monitor_handle, event_tx)))
        .context("failed to spawn service thread")?;

    info!("daemon initialized, entering main loop");

    // Ends once the service runtime is gone and with it every handle
    while monitor.drain(&mut commands) {
        main_loop.run_once(MAIN_LOOP_SLICE);
    }

    // Cleanup
    info!("shutting down...");

    monitor.stop_all();
    let result = service
        .join()
        .unwrap_or_else(|_| Err(anyhow!("service thread panicked")));

    info!("kawa-daemon stopped");

    result
}

/// IPC server, event log and signal handling
async fn serve(
    config: Config,
    monitor: MonitorHandle,
    event_tx: broadcast::Sender<MonitorEvent>,
) -> Result<()> {
    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;
    let mut event_log_rx = event_tx.subscribe();

    let server = Server::new(
        &config.socket_path,
        monitor,
        event_tx,
        config.show_notification,
    )?;

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log monitor events
        _ = async {
            loop {
                match event_log_rx.recv().await {
                    Ok(event) => debug!(%event, "monitor event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event log receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event log exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    server.shutdown().await;
    Ok(())
}
