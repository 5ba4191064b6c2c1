//! Key press dispatch
//!
//! `KeyHandler` is the context object owning the action table, the tabbing
//! session and the rotation index. The host constructs one at startup and
//! feeds it every grabbed key press and release.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::actions::{Action, ActionTable, BuiltinAction, ExtensionId};
use crate::hotkey::{KeyGrabber, KeyId, ModifierMask};
use crate::shell::{Desktop, DisplayError, DisplayMode, DisplayTools, Orientation, SpeechQueue, ZoomLevel};
use crate::state::{Direction, TabbingSession, Transition};

use super::rotation::Rotation;

/// Step sizes and maxima for the volume and brightness keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub volume_step: u32,
    pub volume_max: u32,
    pub brightness_step: u32,
    pub brightness_max: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            volume_step: 10,
            volume_max: 100,
            brightness_step: 2,
            brightness_max: 15,
        }
    }
}

/// The last key press that resolved to a binding, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingKeypress {
    pub key: KeyId,
    pub keycode: u32,
    pub state: ModifierMask,
}

/// Fatal dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum KeyHandlerError {
    #[error("screen rotation failed: {0}")]
    Display(#[from] DisplayError),
}

/// How a level-style action changes its value
#[derive(Debug, Clone, Copy)]
enum Change {
    Step(i64),
    Set(u32),
}

impl Change {
    fn apply(self, current: u32, max: u32) -> u32 {
        let target = match self {
            Change::Step(delta) => i64::from(current) + delta,
            Change::Set(value) => i64::from(value),
        };
        target.clamp(0, i64::from(max)) as u32
    }
}

/// Dispatches grabbed keys to actions
pub struct KeyHandler<D: Desktop> {
    table: ActionTable,
    grabber: Box<dyn KeyGrabber>,
    tabbing: TabbingSession,
    rotation: Rotation,
    last_press: Option<PendingKeypress>,
    desktop: D,
    display: Box<dyn DisplayTools>,
    speech: SpeechQueue,
    limits: Limits,
}

impl<D: Desktop> KeyHandler<D> {
    /// Create a handler and grab every key in `table`
    pub fn new(
        table: ActionTable,
        mut grabber: Box<dyn KeyGrabber>,
        desktop: D,
        display: Box<dyn DisplayTools>,
        speech: SpeechQueue,
        limits: Limits,
        tabbing_modifier: ModifierMask,
    ) -> Self {
        let keys = table.all_keys();
        let grabbed = grabber.grab_keys(&keys);
        info!(
            keys = keys.len(),
            grabbed,
            extensions = table.extension_count(),
            "key handler ready"
        );

        Self {
            table,
            grabber,
            tabbing: TabbingSession::new(tabbing_modifier),
            rotation: Rotation::new(),
            last_press: None,
            desktop,
            display,
            speech,
            limits,
        }
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    pub fn desktop_mut(&mut self) -> &mut D {
        &mut self.desktop
    }

    pub fn is_tabbing(&self) -> bool {
        self.tabbing.is_tabbing()
    }

    pub fn orientation(&self) -> Orientation {
        self.rotation.orientation()
    }

    pub fn last_press(&self) -> Option<&PendingKeypress> {
        self.last_press.as_ref()
    }

    /// Handle a key press; returns whether the event was consumed
    pub fn on_key_press(&mut self, keycode: u32, state: ModifierMask) -> Result<bool, KeyHandlerError> {
        let key = self.grabber.key_for(keycode, state);
        debug!(keycode, state = state.0, key = ?key.as_ref().map(ToString::to_string), "key pressed");

        let Some(key) = key else {
            return Ok(self.unbound_key(keycode));
        };

        let Some(action) = self.table.lookup(&key) else {
            warn!(%key, "grabbed key has no action");
            return Ok(self.unbound_key(keycode));
        };

        self.last_press = Some(PendingKeypress {
            key: key.clone(),
            keycode,
            state,
        });

        if self.tabbing.is_tabbing() && !matches!(action, Action::Builtin(a) if a.is_tabbing()) {
            // Anything but another switch step ends the session and is swallowed
            debug!(%key, %action, state = %self.tabbing.state(), "key cancels tabbing");
            self.cancel_tabbing();
            return Ok(true);
        }

        match action {
            Action::Builtin(action) => self.run_builtin(action)?,
            Action::Extension(id) => self.run_extension(id, &key),
        }

        Ok(true)
    }

    /// Handle a key release; returns whether the event was consumed
    pub fn on_key_release(&mut self, keycode: u32, state: ModifierMask) -> bool {
        if !self.tabbing.is_tabbing() {
            return false;
        }

        if self.grabber.is_modifier(keycode, Some(self.tabbing.modifier())) {
            debug!(keycode, state = state.0, "tabbing modifier released");
            let transition = self.tabbing.finish();
            self.apply_transition(transition);
        }

        true
    }

    /// A press that matched no binding only matters while tabbing
    fn unbound_key(&mut self, keycode: u32) -> bool {
        if !self.tabbing.is_tabbing() {
            return false;
        }
        if !self.grabber.is_modifier(keycode, None) {
            self.cancel_tabbing();
        }
        true
    }

    fn cancel_tabbing(&mut self) {
        let transition = self.tabbing.cancel();
        self.apply_transition(transition);
    }

    fn run_extension(&mut self, id: ExtensionId, key: &KeyId) {
        let Some(extension) = self.table.extension_mut(id) else {
            error!(%key, ?id, "binding refers to a missing extension");
            return;
        };

        debug!(extension = extension.name(), %key, "dispatching to extension");
        if let Err(e) = extension.handle_key_press(key) {
            error!(extension = extension.name(), %key, error = %e, "extension failed to handle key");
        }
    }

    fn run_builtin(&mut self, action: BuiltinAction) -> Result<(), KeyHandlerError> {
        debug!(%action, "running action");

        let volume_step = i64::from(self.limits.volume_step);
        let brightness_step = i64::from(self.limits.brightness_step);

        match action {
            BuiltinAction::ZoomMesh => self.desktop.set_zoom_level(ZoomLevel::Mesh),
            BuiltinAction::ZoomGroup => self.desktop.set_zoom_level(ZoomLevel::Group),
            BuiltinAction::ZoomHome => self.desktop.set_zoom_level(ZoomLevel::Home),
            BuiltinAction::ZoomActivity => self.desktop.set_zoom_level(ZoomLevel::Activity),
            BuiltinAction::BrightnessDown => self.change_brightness(Change::Step(-brightness_step)),
            BuiltinAction::BrightnessUp => self.change_brightness(Change::Step(brightness_step)),
            BuiltinAction::BrightnessMin => self.change_brightness(Change::Set(0)),
            BuiltinAction::BrightnessMax => self.change_brightness(Change::Set(self.limits.brightness_max)),
            BuiltinAction::VolumeMute | BuiltinAction::VolumeMin => self.change_volume(Change::Set(0)),
            BuiltinAction::VolumeDown => self.change_volume(Change::Step(-volume_step)),
            BuiltinAction::VolumeUp => self.change_volume(Change::Step(volume_step)),
            BuiltinAction::VolumeMax => self.change_volume(Change::Set(self.limits.volume_max)),
            BuiltinAction::Frame => self.desktop.toggle_frame(),
            BuiltinAction::Rotate => self.rotate()?,
            BuiltinAction::NextWindow => self.switch_window(Direction::Next),
            BuiltinAction::PreviousWindow => self.switch_window(Direction::Previous),
            BuiltinAction::CloseWindow => self.close_window(),
            BuiltinAction::OpenSearch => self.desktop.focus_journal_search(),
            BuiltinAction::QuitEmulator => self.desktop.request_shutdown(),
            BuiltinAction::SayText => {
                self.speech.request();
            }
        }

        Ok(())
    }

    fn change_volume(&mut self, change: Change) {
        let volume = change.apply(self.desktop.volume(), self.limits.volume_max);
        self.desktop.set_volume(volume, volume == 0);
    }

    fn change_brightness(&mut self, change: Change) {
        let level = change.apply(self.desktop.brightness(), self.limits.brightness_max);
        self.desktop.set_brightness(level);
        self.desktop.set_display_mode(if level == 0 {
            DisplayMode::Monochrome
        } else {
            DisplayMode::Color
        });
    }

    fn switch_window(&mut self, direction: Direction) {
        let desktop = &self.desktop;
        let transition = self
            .tabbing
            .advance(direction, || desktop.windows().into_iter().map(|w| w.id).collect());
        self.apply_transition(transition);
    }

    fn apply_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Started { staged } | Transition::Advanced { staged } => {
                self.desktop.show_switcher(staged);
            }
            Transition::Cancelled => self.desktop.hide_switcher(),
            Transition::Finished { target } => {
                self.desktop.hide_switcher();
                if let Some(window) = target {
                    self.desktop.activate_window(window);
                }
            }
            Transition::Unchanged => {}
        }
    }

    fn close_window(&mut self) {
        match self.desktop.active_window() {
            Some(window) if window.is_journal => debug!("not closing the journal"),
            Some(window) => self.desktop.close_window(window.id),
            None => debug!("no active window to close"),
        }
    }

    fn rotate(&mut self) -> Result<(), KeyHandlerError> {
        let step = self.rotation.rotate();
        info!(orientation = %step.orientation, "rotating screen");

        let result = self
            .display
            .remap_keys(&step.mappings)
            .and_then(|()| self.display.set_orientation(step.orientation));

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_interrupted() => {
                warn!(error = %e, "display tool interrupted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
