//! shell-keyd: global hotkey dispatcher for a desktop shell
//!
//! The host shell grabs keys on the X server and forwards every key event
//! over a Unix socket. This daemon provides:
//! - The action table binding key identifiers to built-in and extension actions
//! - Extension units loaded from the `globalkey` directory
//! - The Alt-Tab window switching state machine
//! - Volume, brightness, zoom, rotation, window and speech operations
//! - Shell event notifications for subscribed clients

mod actions;
mod config;
mod dispatch;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod shell;
mod state;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::actions::{load_extensions, ActionTable};
use crate::config::Config;
use crate::dispatch::{DispatchHandle, KeyHandler};
use crate::events::ShellEvent;
use crate::hotkey::Keymap;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::shell::{run_speech_worker, CommandSelection, CommandSpeech, ShellModel, SpeechQueue, XDisplayTools};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "shell-keyd starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.extensions_dir, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Key handler -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<ShellEvent>(64);

    let desktop = ShellModel::new(event_tx.clone(), config.volume.initial, config.brightness.initial);

    let mut table = ActionTable::with_builtins_for(Keymap::with_overrides(&config.keycodes));
    load_extensions(&config.extensions_dir, &mut table);

    // Speech requests are spoken one at a time by a single worker
    let (speech, speech_rx) = SpeechQueue::new();
    let speech_worker = tokio::spawn(run_speech_worker(
        speech_rx,
        CommandSelection::new(config.speech.selection_command.clone()),
        CommandSpeech::new(config.speech.say_command.clone()),
    ));

    let grabber = Box::new(table.keymap().clone());
    let handler = KeyHandler::new(
        table,
        grabber,
        desktop,
        Box::new(XDisplayTools::new(&config.display.xmodmap, &config.display.xrandr)),
        speech,
        config.limits(),
        config.tabbing_modifier()?,
    );

    // IPC server -> key handler
    let (dispatch_tx, dispatch_rx) = mpsc::channel(32);
    let server = Server::new(&config.socket_path, DispatchHandle::new(dispatch_tx), event_tx)?;

    info!("daemon initialized, entering main loop");

    let mut outcome = Ok(());

    tokio::select! {
        result = handler.run(dispatch_rx) => {
            match result {
                Ok(()) => info!("key handler exited"),
                Err(e) => {
                    error!(error = %e, "key handler failed");
                    outcome = Err(e.into());
                }
            }
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    speech_worker.abort();

    info!("shell-keyd stopped");

    outcome
}
