//! Shell collaborators the key handler delegates to
//!
//! The traits here are the narrow interfaces to sound, screen and the shell
//! window model. `ShellModel` is the in-memory implementation the daemon runs
//! with; it publishes every change as a `ShellEvent` for the host to apply.

mod display;
mod model;
mod speech;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use display::{DisplayError, DisplayTools, Orientation, XDisplayTools};
pub use model::{ShellModel, ShellSnapshot};
pub use speech::{
    run_speech_worker, CommandSelection, CommandSpeech, SelectionSource, SpeechError, SpeechQueue,
    SpeechRequest, SpeechService,
};

/// Shell zoom levels, from the widest view to a single activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomLevel {
    Mesh,
    Group,
    Home,
    Activity,
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self::Home
    }
}

/// Display color mode; monochrome is used when the backlight is off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Color,
    Monochrome,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::Color
    }
}

/// Host-assigned window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A top-level activity window as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    #[serde(default)]
    pub title: String,
    /// The journal window is protected from closing via hotkey
    #[serde(default)]
    pub is_journal: bool,
}

/// Sound volume accessors
pub trait Sound {
    fn volume(&self) -> u32;
    /// Set the level and mute flag together
    fn set_volume(&mut self, volume: u32, muted: bool);
}

/// Display brightness accessors
pub trait Screen {
    fn brightness(&self) -> u32;
    fn set_brightness(&mut self, level: u32);
    fn set_display_mode(&mut self, mode: DisplayMode);
}

/// Window model, frame, journal and session accessors
pub trait Shell {
    fn zoom_level(&self) -> ZoomLevel;
    fn set_zoom_level(&mut self, level: ZoomLevel);

    /// Windows in most-recently-used order, the active window first
    fn windows(&self) -> Vec<Window>;
    fn active_window(&self) -> Option<Window>;
    fn activate_window(&mut self, id: WindowId);
    fn close_window(&mut self, id: WindowId);

    /// Show the window switcher with `staged` highlighted
    fn show_switcher(&mut self, staged: Option<WindowId>);
    fn hide_switcher(&mut self);

    fn toggle_frame(&mut self);
    fn focus_journal_search(&mut self);
    fn request_shutdown(&mut self);
}

/// Everything the key handler needs from the desktop
pub trait Desktop: Sound + Screen + Shell + Send {}

impl<T: Sound + Screen + Shell + Send> Desktop for T {}
