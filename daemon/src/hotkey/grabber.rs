//! Key grabber seam and the keycode binding table
//!
//! The host shell owns the actual X11 grab and forwards raw keycodes with the
//! modifier state. `Keymap` answers the two questions the dispatcher asks
//! about such an event: which grabbed key identifier it matches, and whether
//! the keycode is itself a modifier key.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::keys::{masks, KeyId, KeyName, ModifierMask};

/// Resolves raw key events against the set of grabbed key identifiers
pub trait KeyGrabber: Send {
    /// Register the identifiers that should be resolved from now on,
    /// returning how many were grabbed
    fn grab_keys(&mut self, keys: &[KeyId]) -> usize;

    /// Resolve a keycode and modifier state to a grabbed identifier
    fn key_for(&self, keycode: u32, state: ModifierMask) -> Option<KeyId>;

    /// Check whether the keycode is a modifier key, optionally restricted
    /// to modifiers overlapping `mask`
    fn is_modifier(&self, keycode: u32, mask: Option<ModifierMask>) -> bool;
}

/// The physical key and modifier state a grab is made on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySlot {
    pub keycode: u32,
    pub modifiers: ModifierMask,
}

/// Default evdev keycodes for the keysyms the shell binds
const DEFAULT_KEYCODES: &[(&str, u32)] = &[
    ("Escape", 9),
    ("1", 10),
    ("2", 11),
    ("3", 12),
    ("4", 13),
    ("5", 14),
    ("6", 15),
    ("7", 16),
    ("8", 17),
    ("9", 18),
    ("0", 19),
    ("Tab", 23),
    ("q", 24),
    ("w", 25),
    ("e", 26),
    ("r", 27),
    ("t", 28),
    ("y", 29),
    ("u", 30),
    ("i", 31),
    ("o", 32),
    ("p", 33),
    ("Return", 36),
    ("a", 38),
    ("s", 39),
    ("d", 40),
    ("f", 41),
    ("g", 42),
    ("h", 43),
    ("j", 44),
    ("k", 45),
    ("l", 46),
    ("z", 52),
    ("x", 53),
    ("c", 54),
    ("v", 55),
    ("b", 56),
    ("n", 57),
    ("m", 58),
    ("space", 65),
    ("F1", 67),
    ("F2", 68),
    ("F3", 69),
    ("F4", 70),
    ("F5", 71),
    ("F6", 72),
    ("F7", 73),
    ("F8", 74),
    ("F9", 75),
    ("F10", 76),
    ("KP_Up", 80),
    ("KP_Left", 83),
    ("KP_Right", 85),
    ("KP_Down", 88),
    ("F11", 95),
    ("F12", 96),
    ("XF86AudioMute", 121),
    ("XF86AudioLowerVolume", 122),
    ("XF86AudioRaiseVolume", 123),
];

/// Keycodes of the modifier keys themselves
const MODIFIER_KEYCODES: &[(u32, ModifierMask)] = &[
    (37, masks::CONTROL),  // Control_L
    (50, masks::SHIFT),    // Shift_L
    (62, masks::SHIFT),    // Shift_R
    (64, masks::ALT),      // Alt_L
    (105, masks::CONTROL), // Control_R
    (108, masks::ALT),     // Alt_R
    (133, masks::SUPER),   // Super_L
    (134, masks::SUPER),   // Super_R
];

/// Keysym table plus the resolved grabs
#[derive(Debug, Clone)]
pub struct Keymap {
    keycodes: HashMap<String, u32>,
    modifier_keys: HashMap<u32, ModifierMask>,
    grabs: HashMap<KeySlot, KeyId>,
}

impl Keymap {
    /// Create a keymap with the default keycode table
    pub fn new() -> Self {
        Self {
            keycodes: DEFAULT_KEYCODES
                .iter()
                .map(|(sym, code)| (sym.to_string(), *code))
                .collect(),
            modifier_keys: MODIFIER_KEYCODES.iter().copied().collect(),
            grabs: HashMap::new(),
        }
    }

    /// Create a keymap with keysym overrides layered over the defaults
    pub fn with_overrides(overrides: &HashMap<String, u32>) -> Self {
        let mut keymap = Self::new();
        for (sym, code) in overrides {
            keymap.keycodes.insert(sym.clone(), *code);
        }
        keymap
    }

    /// Slot a key identifier occupies; different spellings of the same
    /// physical key share one slot
    pub fn slot_for(&self, key: &KeyId) -> Option<KeySlot> {
        self.keycode_for(&key.key).map(|keycode| KeySlot {
            keycode,
            modifiers: key.modifiers,
        })
    }

    fn keycode_for(&self, key: &KeyName) -> Option<u32> {
        match key {
            KeyName::Code(code) => Some(*code),
            KeyName::Sym(sym) => self.keycodes.get(sym).copied().or_else(|| {
                // Single letters are stored lowercase; shift is a modifier, not a case
                if sym.chars().count() == 1 {
                    self.keycodes.get(&sym.to_ascii_lowercase()).copied()
                } else {
                    None
                }
            }),
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGrabber for Keymap {
    fn grab_keys(&mut self, keys: &[KeyId]) -> usize {
        let mut grabbed = 0;
        for key in keys {
            let Some(slot) = self.slot_for(key) else {
                warn!(%key, "no keycode for key, not grabbed");
                continue;
            };

            match self.grabs.get(&slot) {
                Some(existing) if existing != key => {
                    warn!(%key, %existing, keycode = slot.keycode, "keycode already grabbed by another key");
                }
                _ => {
                    debug!(%key, keycode = slot.keycode, "key grabbed");
                    self.grabs.insert(slot, key.clone());
                    grabbed += 1;
                }
            }
        }
        grabbed
    }

    fn key_for(&self, keycode: u32, state: ModifierMask) -> Option<KeyId> {
        let slot = KeySlot {
            keycode,
            modifiers: state.normalized(),
        };
        self.grabs.get(&slot).cloned()
    }

    fn is_modifier(&self, keycode: u32, mask: Option<ModifierMask>) -> bool {
        match (self.modifier_keys.get(&keycode), mask) {
            (Some(modifier), Some(mask)) => modifier.intersects(mask),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
