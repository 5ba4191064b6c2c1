//! Hotkey module: key identifiers and keycode resolution
//!
//! The host shell performs the X11 grab and forwards raw keycodes; this
//! module turns them back into the key identifiers the action table uses.

mod grabber;
mod keys;

pub use grabber::{KeyGrabber, KeySlot, Keymap};
pub use keys::{masks, KeyId, KeyName, KeyParseError, ModifierMask};
