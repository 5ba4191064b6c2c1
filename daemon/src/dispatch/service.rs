//! Key handler task
//!
//! The handler runs on a single task and receives work over an mpsc channel,
//! so its state is never touched concurrently. `DispatchHandle` is the
//! cloneable client side used by the IPC server.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::hotkey::{KeyId, ModifierMask};
use crate::shell::{Orientation, ShellModel, ShellSnapshot, Window, WindowId};

use super::handler::{KeyHandler, KeyHandlerError, PendingKeypress};

/// Work for the key handler task
#[derive(Debug)]
pub enum DispatchCommand {
    KeyPress {
        keycode: u32,
        state: ModifierMask,
        reply: oneshot::Sender<bool>,
    },
    KeyRelease {
        keycode: u32,
        state: ModifierMask,
        reply: oneshot::Sender<bool>,
    },
    UpdateWindows {
        windows: Vec<Window>,
        active: Option<WindowId>,
        reply: oneshot::Sender<()>,
    },
    ListKeys {
        reply: oneshot::Sender<Vec<KeyId>>,
    },
    Status {
        reply: oneshot::Sender<HandlerStatus>,
    },
}

/// Snapshot of the handler and shell state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerStatus {
    pub tabbing: bool,
    pub orientation: Orientation,
    pub bound_keys: usize,
    pub extensions: usize,
    pub last_key: Option<PendingKeypress>,
    pub shell: ShellSnapshot,
}

/// The key handler task has stopped
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("key handler is not running")]
pub struct DispatchClosed;

/// Client side of the key handler task
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchCommand>,
}

impl DispatchHandle {
    pub fn new(tx: mpsc::Sender<DispatchCommand>) -> Self {
        Self { tx }
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> DispatchCommand) -> Result<T, DispatchClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| DispatchClosed)?;
        rx.await.map_err(|_| DispatchClosed)
    }

    pub async fn key_press(&self, keycode: u32, state: ModifierMask) -> Result<bool, DispatchClosed> {
        self.call(|reply| DispatchCommand::KeyPress { keycode, state, reply }).await
    }

    pub async fn key_release(&self, keycode: u32, state: ModifierMask) -> Result<bool, DispatchClosed> {
        self.call(|reply| DispatchCommand::KeyRelease { keycode, state, reply }).await
    }

    pub async fn update_windows(&self, windows: Vec<Window>, active: Option<WindowId>) -> Result<(), DispatchClosed> {
        self.call(|reply| DispatchCommand::UpdateWindows { windows, active, reply }).await
    }

    pub async fn list_keys(&self) -> Result<Vec<KeyId>, DispatchClosed> {
        self.call(|reply| DispatchCommand::ListKeys { reply }).await
    }

    pub async fn status(&self) -> Result<HandlerStatus, DispatchClosed> {
        self.call(|reply| DispatchCommand::Status { reply }).await
    }
}

impl KeyHandler<ShellModel> {
    /// Process commands until every handle is dropped or a fatal error occurs
    pub async fn run(mut self, mut rx: mpsc::Receiver<DispatchCommand>) -> Result<(), KeyHandlerError> {
        info!("key handler started");

        while let Some(command) = rx.recv().await {
            match command {
                DispatchCommand::KeyPress { keycode, state, reply } => {
                    match self.on_key_press(keycode, state) {
                        Ok(consumed) => {
                            let _ = reply.send(consumed);
                        }
                        Err(e) => {
                            error!(error = %e, keycode, "fatal error handling key press");
                            return Err(e);
                        }
                    }
                }
                DispatchCommand::KeyRelease { keycode, state, reply } => {
                    let _ = reply.send(self.on_key_release(keycode, state));
                }
                DispatchCommand::UpdateWindows { windows, active, reply } => {
                    self.desktop_mut().update_windows(windows, active);
                    let _ = reply.send(());
                }
                DispatchCommand::ListKeys { reply } => {
                    let _ = reply.send(self.table().all_keys());
                }
                DispatchCommand::Status { reply } => {
                    let _ = reply.send(self.status());
                }
            }
        }

        info!("key handler stopped");
        Ok(())
    }

    pub fn status(&self) -> HandlerStatus {
        HandlerStatus {
            tabbing: self.is_tabbing(),
            orientation: self.orientation(),
            bound_keys: self.table().len(),
            extensions: self.table().extension_count(),
            last_key: self.last_press().cloned(),
            shell: self.desktop().snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    use crate::actions::ActionTable;
    use crate::dispatch::Limits;
    use crate::events::ShellEvent;
    use crate::hotkey::{masks, Keymap};
    use crate::shell::{DisplayError, DisplayTools, SpeechQueue};

    struct NoDisplay;

    impl DisplayTools for NoDisplay {
        fn remap_keys(&mut self, _mappings: &[(u32, &str)]) -> Result<(), DisplayError> {
            Err(DisplayError::Failed {
                program: "xmodmap".to_string(),
                status: "exit status: 1".to_string(),
            })
        }

        fn set_orientation(&mut self, _orientation: Orientation) -> Result<(), DisplayError> {
            Ok(())
        }
    }

    fn spawn_handler() -> (DispatchHandle, broadcast::Receiver<ShellEvent>, tokio::task::JoinHandle<Result<(), KeyHandlerError>>) {
        let (event_tx, event_rx) = broadcast::channel(32);
        let (speech, _speech_rx) = SpeechQueue::new();
        let handler = KeyHandler::new(
            ActionTable::with_builtins(),
            Box::new(Keymap::new()),
            ShellModel::new(event_tx, 50, 15),
            Box::new(NoDisplay),
            speech,
            Limits::default(),
            masks::ALT,
        );
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(handler.run(rx));
        (DispatchHandle::new(tx), event_rx, task)
    }

    fn window(id: u64) -> Window {
        Window {
            id: WindowId(id),
            title: String::new(),
            is_journal: false,
        }
    }

    #[tokio::test]
    async fn test_key_press_through_handle() {
        let (handle, mut events, _task) = spawn_handler();

        assert!(handle.key_press(76, ModifierMask::NONE).await.unwrap());
        assert!(!handle.key_press(38, ModifierMask::NONE).await.unwrap());
        assert_eq!(events.recv().await.unwrap(), ShellEvent::BrightnessChanged { level: 15 });

        let status = handle.status().await.unwrap();
        assert_eq!(status.last_key.unwrap().key.to_string(), "F10");
        assert_eq!(status.shell.brightness, 15);
    }

    #[tokio::test]
    async fn test_tabbing_through_handle() {
        let (handle, mut events, _task) = spawn_handler();
        handle
            .update_windows(vec![window(1), window(2)], Some(WindowId(2)))
            .await
            .unwrap();

        assert!(handle.key_press(23, masks::ALT).await.unwrap());
        assert!(handle.status().await.unwrap().tabbing);
        assert!(handle.key_release(64, masks::ALT).await.unwrap());

        let mut activated = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ShellEvent::WindowActivated { window } = event {
                activated.push(window);
            }
        }
        assert_eq!(activated, vec![WindowId(1)]);
        assert_eq!(handle.status().await.unwrap().shell.active_window, Some(WindowId(1)));
    }

    #[tokio::test]
    async fn test_volume_min_emits_single_muted_event() {
        let (handle, mut events, _task) = spawn_handler();

        // <alt>F11
        assert!(handle.key_press(95, masks::ALT).await.unwrap());
        assert_eq!(events.recv().await.unwrap(), ShellEvent::VolumeChanged { volume: 0, muted: true });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_list_keys() {
        let (handle, _events, _task) = spawn_handler();
        let keys = handle.list_keys().await.unwrap();
        assert!(keys.iter().any(|k| k.to_string() == "<alt>Tab"));
    }

    #[tokio::test]
    async fn test_rotation_failure_stops_handler() {
        let (handle, _events, task) = spawn_handler();
        assert!(handle.key_press(0xEB, ModifierMask::NONE).await.is_err());
        assert!(matches!(task.await.unwrap(), Err(KeyHandlerError::Display(_))));
        assert!(handle.status().await.is_err());
    }
}
