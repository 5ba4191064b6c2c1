//! Events published by the shell model
//!
//! Every state change the key handler causes is broadcast as a `ShellEvent`
//! so subscribed host processes can apply it.

use serde::{Deserialize, Serialize};

use crate::shell::{DisplayMode, WindowId, ZoomLevel};

/// Shell state changes caused by hotkeys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellEvent {
    /// Zoom level changed
    ZoomChanged { level: ZoomLevel },

    /// Volume or mute flag changed
    VolumeChanged { volume: u32, muted: bool },

    /// Brightness level changed
    BrightnessChanged { level: u32 },

    /// Display switched between color and monochrome
    DisplayModeChanged { mode: DisplayMode },

    /// Frame visibility toggled
    FrameToggled,

    /// Window switcher shown or its highlighted window moved
    SwitcherShown { staged: Option<WindowId> },

    /// Window switcher hidden
    SwitcherHidden,

    /// A window was made active
    WindowActivated { window: WindowId },

    /// A window was asked to close
    WindowCloseRequested { window: WindowId },

    /// Journal search field focused
    SearchFocused,

    /// Session shutdown requested
    ShutdownRequested,
}

impl std::fmt::Display for ShellEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellEvent::ZoomChanged { level } => write!(f, "ZOOM_CHANGED ({:?})", level),
            ShellEvent::VolumeChanged { volume, muted } => {
                write!(f, "VOLUME_CHANGED ({}{})", volume, if *muted { ", muted" } else { "" })
            }
            ShellEvent::BrightnessChanged { level } => write!(f, "BRIGHTNESS_CHANGED ({})", level),
            ShellEvent::DisplayModeChanged { mode } => write!(f, "DISPLAY_MODE_CHANGED ({:?})", mode),
            ShellEvent::FrameToggled => write!(f, "FRAME_TOGGLED"),
            ShellEvent::SwitcherShown { staged: Some(id) } => write!(f, "SWITCHER_SHOWN ({})", id),
            ShellEvent::SwitcherShown { staged: None } => write!(f, "SWITCHER_SHOWN"),
            ShellEvent::SwitcherHidden => write!(f, "SWITCHER_HIDDEN"),
            ShellEvent::WindowActivated { window } => write!(f, "WINDOW_ACTIVATED ({})", window),
            ShellEvent::WindowCloseRequested { window } => {
                write!(f, "WINDOW_CLOSE_REQUESTED ({})", window)
            }
            ShellEvent::SearchFocused => write!(f, "SEARCH_FOCUSED"),
            ShellEvent::ShutdownRequested => write!(f, "SHUTDOWN_REQUESTED"),
        }
    }
}
