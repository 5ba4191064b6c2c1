//! Key identifier to action table
//!
//! Holds the fixed built-in bindings plus any extension bindings merged in at
//! startup. Every physical key and modifier combination is bound at most
//! once, however its identifier is spelled.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::hotkey::{KeyId, KeySlot, Keymap};

use super::extension::{Extension, ExtensionError};

/// Operations implemented directly by the key handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinAction {
    ZoomMesh,
    ZoomGroup,
    ZoomHome,
    ZoomActivity,
    BrightnessDown,
    BrightnessUp,
    BrightnessMin,
    BrightnessMax,
    VolumeMute,
    VolumeDown,
    VolumeUp,
    VolumeMin,
    VolumeMax,
    Frame,
    Rotate,
    NextWindow,
    PreviousWindow,
    CloseWindow,
    OpenSearch,
    QuitEmulator,
    SayText,
}

impl BuiltinAction {
    pub const ALL: [BuiltinAction; 21] = [
        BuiltinAction::ZoomMesh,
        BuiltinAction::ZoomGroup,
        BuiltinAction::ZoomHome,
        BuiltinAction::ZoomActivity,
        BuiltinAction::BrightnessDown,
        BuiltinAction::BrightnessUp,
        BuiltinAction::BrightnessMin,
        BuiltinAction::BrightnessMax,
        BuiltinAction::VolumeMute,
        BuiltinAction::VolumeDown,
        BuiltinAction::VolumeUp,
        BuiltinAction::VolumeMin,
        BuiltinAction::VolumeMax,
        BuiltinAction::Frame,
        BuiltinAction::Rotate,
        BuiltinAction::NextWindow,
        BuiltinAction::PreviousWindow,
        BuiltinAction::CloseWindow,
        BuiltinAction::OpenSearch,
        BuiltinAction::QuitEmulator,
        BuiltinAction::SayText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinAction::ZoomMesh => "zoom_mesh",
            BuiltinAction::ZoomGroup => "zoom_group",
            BuiltinAction::ZoomHome => "zoom_home",
            BuiltinAction::ZoomActivity => "zoom_activity",
            BuiltinAction::BrightnessDown => "brightness_down",
            BuiltinAction::BrightnessUp => "brightness_up",
            BuiltinAction::BrightnessMin => "brightness_min",
            BuiltinAction::BrightnessMax => "brightness_max",
            BuiltinAction::VolumeMute => "volume_mute",
            BuiltinAction::VolumeDown => "volume_down",
            BuiltinAction::VolumeUp => "volume_up",
            BuiltinAction::VolumeMin => "volume_min",
            BuiltinAction::VolumeMax => "volume_max",
            BuiltinAction::Frame => "frame",
            BuiltinAction::Rotate => "rotate",
            BuiltinAction::NextWindow => "next_window",
            BuiltinAction::PreviousWindow => "previous_window",
            BuiltinAction::CloseWindow => "close_window",
            BuiltinAction::OpenSearch => "open_search",
            BuiltinAction::QuitEmulator => "quit_emulator",
            BuiltinAction::SayText => "say_text",
        }
    }

    /// Window switching actions keep a tabbing session alive
    pub fn is_tabbing(self) -> bool {
        matches!(self, BuiltinAction::NextWindow | BuiltinAction::PreviousWindow)
    }
}

impl fmt::Display for BuiltinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| format!("unknown action {:?}", s))
    }
}

/// Index of a registered extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionId(usize);

/// What a key is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Builtin(BuiltinAction),
    Extension(ExtensionId),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Builtin(action) => write!(f, "{}", action),
            Action::Extension(ExtensionId(index)) => write!(f, "extension #{}", index),
        }
    }
}

/// The fixed built-in bindings
const BUILTIN_BINDINGS: &[(&str, BuiltinAction)] = &[
    ("F1", BuiltinAction::ZoomMesh),
    ("F2", BuiltinAction::ZoomGroup),
    ("F3", BuiltinAction::ZoomHome),
    ("F4", BuiltinAction::ZoomActivity),
    ("F9", BuiltinAction::BrightnessDown),
    ("F10", BuiltinAction::BrightnessUp),
    ("<alt>F9", BuiltinAction::BrightnessMin),
    ("<alt>F10", BuiltinAction::BrightnessMax),
    ("XF86AudioMute", BuiltinAction::VolumeMute),
    ("F11", BuiltinAction::VolumeDown),
    ("XF86AudioLowerVolume", BuiltinAction::VolumeDown),
    ("F12", BuiltinAction::VolumeUp),
    ("XF86AudioRaiseVolume", BuiltinAction::VolumeUp),
    ("<alt>F11", BuiltinAction::VolumeMin),
    ("<alt>F12", BuiltinAction::VolumeMax),
    ("0x93", BuiltinAction::Frame),
    ("0xEB", BuiltinAction::Rotate),
    ("<alt>Tab", BuiltinAction::NextWindow),
    ("<alt><shift>Tab", BuiltinAction::PreviousWindow),
    ("<alt>Escape", BuiltinAction::CloseWindow),
    ("0xDC", BuiltinAction::OpenSearch),
    // emulator users have no special keys
    ("<alt><shift>f", BuiltinAction::Frame),
    ("<alt><shift>q", BuiltinAction::QuitEmulator),
    ("<alt><shift>o", BuiltinAction::OpenSearch),
    ("<alt><shift>r", BuiltinAction::Rotate),
    ("<alt><shift>s", BuiltinAction::SayText),
];

/// A key is already bound
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("key {key} is already bound to {existing}")]
pub struct DuplicateKeyError {
    pub key: KeyId,
    pub existing: Action,
}

/// Bindings from key identifiers to actions
#[derive(Default)]
pub struct ActionTable {
    bindings: HashMap<KeyId, Action>,
    /// Which bound identifier owns each resolvable slot
    slots: HashMap<KeySlot, KeyId>,
    keymap: Keymap,
    extensions: Vec<Box<dyn Extension>>,
}

impl ActionTable {
    /// Create an empty table using the default keymap
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table resolving keys through `keymap`
    pub fn with_keymap(keymap: Keymap) -> Self {
        Self {
            keymap,
            ..Self::default()
        }
    }

    /// Create a table holding the built-in bindings, using the default keymap
    pub fn with_builtins() -> Self {
        Self::with_builtins_for(Keymap::new())
    }

    /// Create a table holding the built-in bindings, resolving through `keymap`
    pub fn with_builtins_for(keymap: Keymap) -> Self {
        let mut table = Self::with_keymap(keymap);
        for (raw, action) in BUILTIN_BINDINGS {
            let result = raw
                .parse::<KeyId>()
                .map_err(|e| e.to_string())
                .and_then(|key| table.register(key, Action::Builtin(*action)).map_err(|e| e.to_string()));
            if let Err(e) = result {
                error!(key = raw, error = %e, "invalid built-in binding");
            }
        }
        debug!(count = table.len(), "built-in bindings registered");
        table
    }

    /// Bind `key` to `action`, refusing to replace an existing binding
    pub fn register(&mut self, key: KeyId, action: Action) -> Result<(), DuplicateKeyError> {
        if let Some(existing) = self.bound_action(&key) {
            return Err(DuplicateKeyError { key, existing });
        }
        self.bind(key, action);
        Ok(())
    }

    /// Bind every key the extension declares, or none of them
    pub fn register_extension(&mut self, extension: Box<dyn Extension>) -> Result<ExtensionId, ExtensionError> {
        let keys = extension.bound_keys();
        if keys.is_empty() {
            return Err(ExtensionError::NoKeys {
                extension: extension.name().to_string(),
            });
        }

        let slots: Vec<Option<KeySlot>> = keys.iter().map(|key| self.keymap.slot_for(key)).collect();
        for (i, key) in keys.iter().enumerate() {
            let repeated = keys[..i].contains(key) || (slots[i].is_some() && slots[..i].contains(&slots[i]));
            if repeated || self.bound_action(key).is_some() {
                return Err(ExtensionError::Duplicate {
                    extension: extension.name().to_string(),
                    key: key.clone(),
                });
            }
        }

        let id = ExtensionId(self.extensions.len());
        for key in keys {
            self.bind(key, Action::Extension(id));
        }
        info!(extension = extension.name(), "extension registered");
        self.extensions.push(extension);
        Ok(id)
    }

    /// Action already holding `key` or any other spelling of the same slot
    fn bound_action(&self, key: &KeyId) -> Option<Action> {
        if let Some(action) = self.bindings.get(key) {
            return Some(*action);
        }
        let owner = self.keymap.slot_for(key).and_then(|slot| self.slots.get(&slot))?;
        self.bindings.get(owner).copied()
    }

    fn bind(&mut self, key: KeyId, action: Action) {
        match self.keymap.slot_for(&key) {
            Some(slot) => {
                self.slots.insert(slot, key.clone());
            }
            None => warn!(%key, "no keycode for key, binding can never fire"),
        }
        self.bindings.insert(key, action);
    }

    pub fn lookup(&self, key: &KeyId) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    /// Every bound key, sorted by canonical name
    pub fn all_keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self.bindings.keys().cloned().collect();
        keys.sort_by_cached_key(|key| key.to_string());
        keys
    }

    /// Keymap the table resolves slots with
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn extension_mut(&mut self, id: ExtensionId) -> Option<&mut (dyn Extension + 'static)> {
        self.extensions.get_mut(id.0).map(|extension| extension.as_mut())
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct TestExtension {
        name: &'static str,
        keys: Vec<&'static str>,
    }

    impl Extension for TestExtension {
        fn name(&self) -> &str {
            self.name
        }

        fn bound_keys(&self) -> Vec<KeyId> {
            self.keys.iter().map(|k| k.parse().unwrap()).collect()
        }

        fn handle_key_press(&mut self, _key: &KeyId) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    fn key(s: &str) -> KeyId {
        s.parse().unwrap()
    }

    #[test]
    fn test_builtin_keys_all_resolve() {
        let table = ActionTable::with_builtins();
        assert_eq!(table.len(), BUILTIN_BINDINGS.len());

        for (raw, action) in BUILTIN_BINDINGS {
            assert_eq!(table.lookup(&key(raw)), Some(Action::Builtin(*action)), "{}", raw);
        }
    }

    #[test]
    fn test_all_keys_unique() {
        let table = ActionTable::with_builtins();
        let keys = table.all_keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn test_every_builtin_action_is_bound() {
        let table = ActionTable::with_builtins();
        let bound: HashSet<_> = table.all_keys().iter().filter_map(|k| table.lookup(k)).collect();
        for action in BuiltinAction::ALL {
            assert!(bound.contains(&Action::Builtin(action)), "{} unbound", action);
        }
    }

    #[test]
    fn test_duplicate_register_keeps_existing() {
        let mut table = ActionTable::with_builtins();
        let err = table
            .register(key("F1"), Action::Builtin(BuiltinAction::Rotate))
            .unwrap_err();
        assert_eq!(err.existing, Action::Builtin(BuiltinAction::ZoomMesh));
        assert_eq!(table.lookup(&key("F1")), Some(Action::Builtin(BuiltinAction::ZoomMesh)));
    }

    #[test]
    fn test_raw_keycode_spellings_collide() {
        let mut table = ActionTable::with_builtins();
        // 0x93 is already the frame key
        assert!(table.register(key("147"), Action::Builtin(BuiltinAction::Rotate)).is_err());
    }

    #[test]
    fn test_other_spelling_of_bound_key_is_rejected() {
        let mut table = ActionTable::with_builtins();
        let err = table
            .register(key("<alt>0x17"), Action::Builtin(BuiltinAction::Rotate))
            .unwrap_err();
        assert_eq!(err.existing, Action::Builtin(BuiltinAction::NextWindow));
        assert_eq!(table.lookup(&key("<alt>0x17")), None);
    }

    #[test]
    fn test_extension_using_alias_spelling_is_rejected() {
        let mut table = ActionTable::with_builtins();
        for spelling in ["<alt>0x17", "<alt><shift>F", "<mod1>23"] {
            let result = table.register_extension(Box::new(TestExtension {
                name: "alias",
                keys: vec!["<alt>5", spelling],
            }));
            assert!(matches!(result, Err(ExtensionError::Duplicate { .. })), "{}", spelling);
        }
        assert_eq!(table.extension_count(), 0);
        assert_eq!(table.lookup(&key("<alt>5")), None);
        assert_eq!(table.len(), BUILTIN_BINDINGS.len());
    }

    #[test]
    fn test_extension_repeating_a_slot_is_rejected() {
        let mut table = ActionTable::new();
        let result = table.register_extension(Box::new(TestExtension {
            name: "twice",
            keys: vec!["<alt>F5", "<alt>0x47"],
        }));
        assert!(matches!(result, Err(ExtensionError::Duplicate { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unresolvable_keys_still_unique_by_name() {
        let mut table = ActionTable::new();
        table
            .register(key("XF86Launch9"), Action::Builtin(BuiltinAction::Frame))
            .unwrap();
        assert!(table
            .register(key("XF86Launch9"), Action::Builtin(BuiltinAction::Rotate))
            .is_err());
    }

    #[test]
    fn test_register_extension() {
        let mut table = ActionTable::with_builtins();
        let id = table
            .register_extension(Box::new(TestExtension {
                name: "screenshot",
                keys: vec!["<alt>1", "<alt>2"],
            }))
            .unwrap();
        assert_eq!(table.lookup(&key("<alt>1")), Some(Action::Extension(id)));
        assert_eq!(table.lookup(&key("<alt>2")), Some(Action::Extension(id)));
        assert_eq!(table.extension_mut(id).unwrap().name(), "screenshot");
    }

    #[test]
    fn test_conflicting_extension_is_rejected_whole() {
        let mut table = ActionTable::with_builtins();
        let before = table.len();
        let err = table
            .register_extension(Box::new(TestExtension {
                name: "greedy",
                keys: vec!["<alt>3", "F1"],
            }))
            .unwrap_err();
        assert!(matches!(err, ExtensionError::Duplicate { .. }));
        assert_eq!(table.len(), before);
        assert_eq!(table.lookup(&key("<alt>3")), None);
        assert_eq!(table.extension_count(), 0);
    }

    #[test]
    fn test_extension_repeating_its_own_key_is_rejected() {
        let mut table = ActionTable::new();
        let result = table.register_extension(Box::new(TestExtension {
            name: "twice",
            keys: vec!["<alt>4", "<alt>4"],
        }));
        assert!(matches!(result, Err(ExtensionError::Duplicate { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_extension_without_keys_is_rejected() {
        let mut table = ActionTable::new();
        let result = table.register_extension(Box::new(TestExtension { name: "idle", keys: vec![] }));
        assert!(matches!(result, Err(ExtensionError::NoKeys { .. })));
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in BuiltinAction::ALL {
            assert_eq!(action.name().parse::<BuiltinAction>(), Ok(action));
        }
        assert!("launch_rockets".parse::<BuiltinAction>().is_err());
    }
}
