//! powerkeys: resident keyboard-shortcut reference
//!
//! Runs in the background and provides:
//! - A global hotkey (default Ctrl+Alt+K) that toggles the shortcut window
//! - A searchable, categorized shortcut collection persisted as JSON
//! - A loopback control server for the tray agent and view front end
//!
//! All UI state lives on one controller task; hotkey presses and control
//! requests are marshaled onto it through channels.

mod app;
mod config;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod settings;
mod store;
mod window;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{AppHandle, Controller};
use crate::config::Config;
use crate::events::AppEvent;
use crate::hotkey::{HotkeyRegistrar, PlatformBackend};
use crate::ipc::Server;
use crate::lifecycle::{InstanceGuard, ShutdownSignal};
use crate::settings::Settings;
use crate::store::{PersistQueue, ShortcutStore};
use crate::window::HeadlessWindow;

/// Identity used for the single-instance lock
const INSTANCE_NAME: &str = "PowerKeysSingleInstance";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "powerkeys starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.data_dir, %config.control_addr, "configuration loaded");

    let _instance = match InstanceGuard::acquire(INSTANCE_NAME, &config.lock_path()) {
        Ok(Some(guard)) => Some(guard),
        Ok(None) => {
            warn!("PowerKeys is already running. Check the system tray.");
            return Ok(());
        }
        Err(e) => {
            warn!(?e, "continuing without single-instance lock");
            None
        }
    };

    let shutdown = ShutdownSignal::new();

    // All document writes go through one ordered queue
    let (queue, _writer) = PersistQueue::spawn();

    let (store, settings) = tokio::join!(
        ShortcutStore::load(
            config.shortcuts_path.clone(),
            config.bundled_shortcuts_path.as_deref(),
            queue.clone(),
        ),
        Settings::load(&config.settings_path),
    );

    if store.is_empty() {
        warn!("no shortcuts available, starting with an empty collection");
    }

    // Create channels for inter-component communication
    // Hotkey backend -> controller
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // Control server -> controller
    let (command_tx, command_rx) = mpsc::channel(32);
    // Controller -> subscribers
    let (event_tx, _event_rx) = broadcast::channel::<AppEvent>(64);

    let registrar = HotkeyRegistrar::new(PlatformBackend::default(), hotkey_tx);
    let window = HeadlessWindow::new(settings.window);
    let mut controller = Controller::new(
        store,
        settings,
        config.settings_path.clone(),
        queue.clone(),
        registrar,
        window,
        event_tx.clone(),
    );

    let server = Server::bind(config.control_addr, AppHandle::new(command_tx), event_tx.clone()).await?;

    let mut log_event_rx = event_tx.subscribe();

    // A refused hotkey is reported as a notice; the app stays resident
    controller.start();

    info!("powerkeys initialized, entering main loop");

    tokio::select! {
        // Run the controller (owns all UI state)
        _ = controller.run(hotkey_rx, command_rx) => {
            info!("controller exited");
        }

        // Run the control server (accepts tray and view connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "control server error");
            }
        }

        // Surface notices until a tray agent shows them
        _ = async {
            loop {
                match log_event_rx.recv().await {
                    Ok(AppEvent::Notice { title, message }) => {
                        warn!(%title, %message, "notice");
                    }
                    Ok(event) => {
                        info!(%event, "app event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "app event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("app event logger exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    controller.shutdown();
    server.shutdown();
    drop(controller);
    queue.flush().await;

    info!("powerkeys stopped");

    Ok(())
}
