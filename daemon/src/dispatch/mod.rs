//! Key dispatch: the key handler, screen rotation and the handler task

mod handler;
mod rotation;
mod service;

pub use handler::{KeyHandler, KeyHandlerError, Limits, PendingKeypress};
pub use service::{DispatchClosed, DispatchCommand, DispatchHandle, HandlerStatus};
