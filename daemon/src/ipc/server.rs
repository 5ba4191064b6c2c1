//! Unix domain socket server for IPC
//!
//! The host shell forwards key events and window lists here and receives
//! whether each event was consumed. Subscribed clients also get every shell
//! event pushed to them.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchHandle;
use crate::events::ShellEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    start_time: Instant,
    dispatch: DispatchHandle,
    events: broadcast::Sender<ShellEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Per-connection context shared with the client task
#[derive(Clone)]
struct ClientContext {
    dispatch: DispatchHandle,
    events: broadcast::Sender<ShellEvent>,
    start_time: Instant,
}

enum Incoming {
    Request(Option<Result<Request, String>>),
    Event(Result<ShellEvent, RecvError>),
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, dispatch: DispatchHandle, events: broadcast::Sender<ShellEvent>) -> Result<Self> {
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
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            start_time: Instant::now(),
            dispatch,
            events,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = ClientContext {
                        dispatch: self.dispatch.clone(),
                        events: self.events.clone(),
                        start_time: self.start_time,
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
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
    async fn handle_client(stream: UnixStream, context: ClientContext) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel(16);
        let reader_task = tokio::spawn(Self::read_requests(reader, request_tx));
        let mut subscription: Option<broadcast::Receiver<ShellEvent>> = None;

        let result = loop {
            let incoming = tokio::select! {
                request = request_rx.recv() => Incoming::Request(request),
                event = next_event(&mut subscription) => Incoming::Event(event),
            };

            let sent = match incoming {
                Incoming::Request(None) => break Ok(()),
                Incoming::Request(Some(Err(message))) => {
                    warn!(%message, "bad request");
                    Self::send_message(&mut writer, &Response::error("bad_request", message)).await
                }
                Incoming::Request(Some(Ok(request))) => {
                    debug!(?request, "received request");
                    if matches!(request, Request::Subscribe) && subscription.is_none() {
                        subscription = Some(context.events.subscribe());
                        debug!("client subscribed to notifications");
                    }
                    let response = Self::process_request(request, &context).await;
                    Self::send_message(&mut writer, &response).await
                }
                Incoming::Event(Ok(event)) => {
                    Self::send_message(&mut writer, &Notification::ShellEvent { event }).await
                }
                Incoming::Event(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "notification receiver lagged");
                    Self::send_message(&mut writer, &Notification::Lagged { skipped }).await
                }
                Incoming::Event(Err(RecvError::Closed)) => {
                    subscription = None;
                    Ok(())
                }
            };

            if let Err(e) = sent {
                break Err(e);
            }
        };

        reader_task.abort();
        result
    }

    /// Read length-prefixed requests until the client disconnects
    async fn read_requests(mut reader: OwnedReadHalf, tx: mpsc::Sender<Result<Request, String>>) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let request = serde_json::from_slice(&msg_buf).map_err(|e| e.to_string());
            if tx.send(request).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &ClientContext) -> Response {
        let dispatch = &context.dispatch;
        let result = match request {
            Request::Ping => Ok(Response::Pong),
            Request::Subscribe => Ok(Response::Subscribed),
            Request::GetStatus => dispatch.status().await.map(|handler| {
                Response::Status(DaemonStatus::new(context.start_time.elapsed().as_secs(), handler))
            }),
            Request::ListKeys => dispatch.list_keys().await.map(|keys| Response::Keys { keys }),
            Request::KeyPress { keycode, state } => dispatch
                .key_press(keycode, state)
                .await
                .map(|consumed| Response::KeyHandled { consumed }),
            Request::KeyRelease { keycode, state } => dispatch
                .key_release(keycode, state)
                .await
                .map(|consumed| Response::KeyHandled { consumed }),
            Request::UpdateWindows { windows, active } => dispatch
                .update_windows(windows, active)
                .await
                .map(|()| Response::WindowsUpdated),
        };

        result.unwrap_or_else(|e| Response::error("handler_stopped", e))
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

/// Next event for a subscribed client; never resolves when unsubscribed
async fn next_event(subscription: &mut Option<broadcast::Receiver<ShellEvent>>) -> Result<ShellEvent, RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::actions::ActionTable;
    use crate::dispatch::{KeyHandler, Limits};
    use crate::hotkey::{masks, Keymap, ModifierMask};
    use crate::shell::{ShellModel, SpeechQueue, XDisplayTools};

    async fn start_server(dir: &Path) -> (Arc<Server>, PathBuf) {
        let (event_tx, _) = broadcast::channel(32);
        let (speech, _speech_rx) = SpeechQueue::new();
        let handler = KeyHandler::new(
            ActionTable::with_builtins(),
            Box::new(Keymap::new()),
            ShellModel::new(event_tx.clone(), 50, 15),
            Box::new(XDisplayTools::new("xmodmap", "xrandr")),
            speech,
            Limits::default(),
            masks::ALT,
        );
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(handler.run(rx));

        let socket_path = dir.join("keyd.sock");
        let server = Arc::new(Server::new(&socket_path, DispatchHandle::new(tx), event_tx).unwrap());
        let running = Arc::clone(&server);
        tokio::spawn(async move { running.run().await });
        (server, socket_path)
    }

    async fn send(stream: &mut UnixStream, request: &Request) {
        let bytes = serde_json::to_vec(request).unwrap();
        stream.write_all(&(bytes.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(&bytes).await.unwrap();
    }

    async fn receive(stream: &mut UnixStream) -> serde_json::Value {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut body = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_key_press() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, socket_path) = start_server(dir.path()).await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        send(&mut stream, &Request::Ping).await;
        assert_eq!(receive(&mut stream).await["type"], "pong");

        send(&mut stream, &Request::KeyPress { keycode: 67, state: ModifierMask::NONE }).await;
        let response = receive(&mut stream).await;
        assert_eq!(response["type"], "key_handled");
        assert_eq!(response["consumed"], true);
    }

    #[tokio::test]
    async fn test_subscriber_gets_events() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, socket_path) = start_server(dir.path()).await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        send(&mut stream, &Request::Subscribe).await;
        assert_eq!(receive(&mut stream).await["type"], "subscribed");

        // F2 zooms to the group view
        send(&mut stream, &Request::KeyPress { keycode: 68, state: ModifierMask::NONE }).await;

        let mut seen_response = false;
        let mut seen_event = false;
        for _ in 0..2 {
            let message = receive(&mut stream).await;
            match message["type"].as_str() {
                Some("key_handled") => seen_response = true,
                Some("shell_event") => {
                    assert_eq!(message["event"]["type"], "zoom_changed");
                    assert_eq!(message["event"]["level"], "group");
                    seen_event = true;
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert!(seen_response && seen_event);
    }

    #[tokio::test]
    async fn test_bad_request_keeps_connection() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, socket_path) = start_server(dir.path()).await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        let garbage = b"{\"type\":\"launch\"}";
        stream.write_all(&(garbage.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(garbage).await.unwrap();
        let response = receive(&mut stream).await;
        assert_eq!(response["type"], "error");
        assert_eq!(response["code"], "bad_request");

        send(&mut stream, &Request::GetStatus).await;
        let status = receive(&mut stream).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["handler"]["tabbing"], false);
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let dir = tempfile::tempdir().unwrap();
        let (server, socket_path) = start_server(dir.path()).await;
        assert!(socket_path.exists());
        server.shutdown().await;
        assert!(!socket_path.exists());
    }
}
