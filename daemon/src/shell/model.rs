//! In-memory shell model
//!
//! Tracks the shell state the hotkeys manipulate and broadcasts each change.
//! The host keeps the window list current through `update_windows`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::ShellEvent;

use super::{DisplayMode, Screen, Shell, Sound, Window, WindowId, ZoomLevel};

/// Serializable view of the shell state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSnapshot {
    pub zoom: ZoomLevel,
    pub volume: u32,
    pub muted: bool,
    pub brightness: u32,
    pub display_mode: DisplayMode,
    pub frame_visible: bool,
    pub active_window: Option<WindowId>,
    pub window_count: usize,
}

/// Shell state shared with the host through events
pub struct ShellModel {
    zoom: ZoomLevel,
    volume: u32,
    muted: bool,
    brightness: u32,
    display_mode: DisplayMode,
    frame_visible: bool,
    /// Most recently used first
    windows: Vec<Window>,
    event_tx: broadcast::Sender<ShellEvent>,
}

impl ShellModel {
    /// Create a model with the given starting volume and brightness
    pub fn new(event_tx: broadcast::Sender<ShellEvent>, volume: u32, brightness: u32) -> Self {
        Self {
            zoom: ZoomLevel::default(),
            volume,
            muted: volume == 0,
            brightness,
            display_mode: if brightness == 0 {
                DisplayMode::Monochrome
            } else {
                DisplayMode::Color
            },
            frame_visible: false,
            windows: Vec::new(),
            event_tx,
        }
    }

    /// Replace the window list, moving `active` to the front
    pub fn update_windows(&mut self, mut windows: Vec<Window>, active: Option<WindowId>) {
        if let Some(active) = active {
            if let Some(pos) = windows.iter().position(|w| w.id == active) {
                let window = windows.remove(pos);
                windows.insert(0, window);
            }
        }
        debug!(count = windows.len(), ?active, "window list updated");
        self.windows = windows;
    }

    pub fn snapshot(&self) -> ShellSnapshot {
        ShellSnapshot {
            zoom: self.zoom,
            volume: self.volume,
            muted: self.muted,
            brightness: self.brightness,
            display_mode: self.display_mode,
            frame_visible: self.frame_visible,
            active_window: self.windows.first().map(|w| w.id),
            window_count: self.windows.len(),
        }
    }

    fn emit(&self, event: ShellEvent) {
        debug!(%event, "emitting shell event");
        // No subscribers is fine; the host may not be connected yet
        let _ = self.event_tx.send(event);
    }
}

impl Sound for ShellModel {
    fn volume(&self) -> u32 {
        self.volume
    }

    fn set_volume(&mut self, volume: u32, muted: bool) {
        self.volume = volume;
        self.muted = muted;
        self.emit(ShellEvent::VolumeChanged { volume, muted });
    }
}

impl Screen for ShellModel {
    fn brightness(&self) -> u32 {
        self.brightness
    }

    fn set_brightness(&mut self, level: u32) {
        self.brightness = level;
        self.emit(ShellEvent::BrightnessChanged { level });
    }

    fn set_display_mode(&mut self, mode: DisplayMode) {
        if self.display_mode != mode {
            info!(?mode, "display mode changed");
            self.display_mode = mode;
            self.emit(ShellEvent::DisplayModeChanged { mode });
        }
    }
}

impl Shell for ShellModel {
    fn zoom_level(&self) -> ZoomLevel {
        self.zoom
    }

    fn set_zoom_level(&mut self, level: ZoomLevel) {
        self.zoom = level;
        self.emit(ShellEvent::ZoomChanged { level });
    }

    fn windows(&self) -> Vec<Window> {
        self.windows.clone()
    }

    fn active_window(&self) -> Option<Window> {
        self.windows.first().cloned()
    }

    fn activate_window(&mut self, id: WindowId) {
        if let Some(pos) = self.windows.iter().position(|w| w.id == id) {
            let window = self.windows.remove(pos);
            self.windows.insert(0, window);
        }
        self.emit(ShellEvent::WindowActivated { window: id });
    }

    fn close_window(&mut self, id: WindowId) {
        self.emit(ShellEvent::WindowCloseRequested { window: id });
    }

    fn show_switcher(&mut self, staged: Option<WindowId>) {
        self.emit(ShellEvent::SwitcherShown { staged });
    }

    fn hide_switcher(&mut self) {
        self.emit(ShellEvent::SwitcherHidden);
    }

    fn toggle_frame(&mut self) {
        self.frame_visible = !self.frame_visible;
        self.emit(ShellEvent::FrameToggled);
    }

    fn focus_journal_search(&mut self) {
        self.emit(ShellEvent::SearchFocused);
    }

    fn request_shutdown(&mut self) {
        info!("session shutdown requested");
        self.emit(ShellEvent::ShutdownRequested);
    }
}
