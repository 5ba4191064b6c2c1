//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::dispatch::HandlerStatus;
use crate::events::ShellEvent;
use crate::hotkey::{KeyId, ModifierMask};
use crate::shell::{Window, WindowId};

/// Requests from the host shell to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to shell event notifications
    Subscribe,

    /// List the key identifiers the host should grab
    ListKeys,

    /// A grabbed key went down
    KeyPress { keycode: u32, state: ModifierMask },

    /// A key went up
    KeyRelease { keycode: u32, state: ModifierMask },

    /// The window list changed
    UpdateWindows {
        windows: Vec<Window>,
        #[serde(default)]
        active: Option<WindowId>,
    },
}

/// Responses from the daemon to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Keys to grab
    Keys { keys: Vec<KeyId> },

    /// Whether a key event was consumed
    KeyHandled { consumed: bool },

    /// Window list accepted
    WindowsUpdated,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl ToString) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Push notification from daemon to host (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Shell state changed
    ShellEvent { event: ShellEvent },

    /// Notifications were dropped because the client fell behind
    Lagged { skipped: u64 },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Key handler state
    pub handler: HandlerStatus,
}

impl DaemonStatus {
    pub fn new(uptime_secs: u64, handler: HandlerStatus) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::masks;

    #[test]
    fn test_request_serialization() {
        let req = Request::KeyPress {
            keycode: 23,
            state: masks::ALT,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"key_press","keycode":23,"state":8}"#);
    }

    #[test]
    fn test_update_windows_deserialization() {
        let json = r#"{"type":"update_windows","windows":[{"id":5,"is_journal":true}]}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        match req {
            Request::UpdateWindows { windows, active } => {
                assert_eq!(windows.len(), 1);
                assert!(windows[0].is_journal);
                assert_eq!(active, None);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::KeyHandled { consumed: true };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("key_handled"));

        let resp = Response::Keys {
            keys: vec!["<alt>Tab".parse().unwrap()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""<alt>Tab""#));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::ShellEvent {
            event: ShellEvent::FrameToggled,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("shell_event"));
        assert!(json.contains("frame_toggled"));
    }
}
