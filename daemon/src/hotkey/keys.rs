//! Key identifier definitions and modifier masks
//!
//! A key identifier names a physical key plus the modifiers that must be
//! held, written as `<alt><shift>Tab`, `F10` or a raw keycode like `0x93`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// X11 modifier masks
pub mod masks {
    use super::ModifierMask;

    /// Shift modifier bit
    pub const SHIFT: ModifierMask = ModifierMask(1 << 0);
    /// Caps Lock bit, ignored when matching bindings
    pub const LOCK: ModifierMask = ModifierMask(1 << 1);
    /// Control modifier bit
    pub const CONTROL: ModifierMask = ModifierMask(1 << 2);
    /// Mod1 (Alt) modifier bit
    pub const ALT: ModifierMask = ModifierMask(1 << 3);
    /// Mod2 (Num Lock) bit, ignored when matching bindings
    pub const NUM_LOCK: ModifierMask = ModifierMask(1 << 4);
    /// Mod4 (Super) modifier bit
    pub const SUPER: ModifierMask = ModifierMask(1 << 6);
}

/// A set of X11 modifier bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierMask(pub u32);

impl ModifierMask {
    /// No modifiers held
    pub const NONE: ModifierMask = ModifierMask(0);

    /// Bits that take part in binding matches
    const RELEVANT: u32 = masks::SHIFT.0 | masks::CONTROL.0 | masks::ALT.0 | masks::SUPER.0;

    /// Check whether every bit of `other` is set
    pub fn contains(self, other: ModifierMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether any bit of `other` is set
    pub fn intersects(self, other: ModifierMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Drop lock-style bits (Caps Lock, Num Lock) and unknown bits
    pub fn normalized(self) -> ModifierMask {
        ModifierMask(self.0 & Self::RELEVANT)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a modifier token without its angle brackets
    fn from_token(token: &str) -> Option<ModifierMask> {
        match token.to_ascii_lowercase().as_str() {
            "alt" | "mod1" => Some(masks::ALT),
            "shift" => Some(masks::SHIFT),
            "control" | "ctrl" | "primary" => Some(masks::CONTROL),
            "super" | "mod4" => Some(masks::SUPER),
            _ => None,
        }
    }
}

impl std::ops::BitOr for ModifierMask {
    type Output = ModifierMask;

    fn bitor(self, rhs: ModifierMask) -> ModifierMask {
        ModifierMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ModifierMask {
    fn bitor_assign(&mut self, rhs: ModifierMask) {
        self.0 |= rhs.0;
    }
}

impl FromStr for ModifierMask {
    type Err = KeyParseError;

    /// Parse a bare modifier name such as `alt` or `<alt>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().trim_start_matches('<').trim_end_matches('>');
        Self::from_token(token).ok_or_else(|| KeyParseError::UnknownModifier(token.to_string()))
    }
}

/// The base key of an identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyName {
    /// Symbolic key name (`F1`, `Tab`, `XF86AudioMute`, `f`)
    Sym(String),
    /// Raw hardware keycode
    Code(u32),
}

/// A key plus the modifiers that must accompany it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub modifiers: ModifierMask,
    pub key: KeyName,
}

impl KeyId {
    pub fn new(modifiers: ModifierMask, key: KeyName) -> Self {
        Self {
            modifiers: modifiers.normalized(),
            key,
        }
    }
}

/// Errors produced while parsing key identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("empty key identifier")]
    Empty,

    #[error("key identifier {0:?} has modifiers but no key")]
    NoKey(String),

    #[error("unknown modifier <{0}>")]
    UnknownModifier(String),

    #[error("unterminated modifier in {0:?}")]
    Unterminated(String),

    #[error("invalid keycode {0:?}")]
    InvalidKeycode(String),
}

impl FromStr for KeyId {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut modifiers = ModifierMask::NONE;
        let mut rest = s;
        while let Some(tail) = rest.strip_prefix('<') {
            let end = tail
                .find('>')
                .ok_or_else(|| KeyParseError::Unterminated(s.to_string()))?;
            let token = &tail[..end];
            modifiers |= ModifierMask::from_token(token)
                .ok_or_else(|| KeyParseError::UnknownModifier(token.to_string()))?;
            rest = &tail[end + 1..];
        }

        if rest.is_empty() {
            return Err(KeyParseError::NoKey(s.to_string()));
        }

        Ok(KeyId::new(modifiers, parse_key_name(rest)?))
    }
}

/// Hex (`0x93`) and all-digit names are raw keycodes, anything else a keysym
fn parse_key_name(name: &str) -> Result<KeyName, KeyParseError> {
    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(KeyName::Code)
            .map_err(|_| KeyParseError::InvalidKeycode(name.to_string()));
    }

    // Single digits are keysyms ("1" is the digit key, not keycode 1)
    if name.len() > 1 && name.chars().all(|c| c.is_ascii_digit()) {
        return name
            .parse()
            .map(KeyName::Code)
            .map_err(|_| KeyParseError::InvalidKeycode(name.to_string()));
    }

    Ok(KeyName::Sym(name.to_string()))
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Sym(sym) => write!(f, "{}", sym),
            KeyName::Code(code) => write!(f, "{:#X}", code),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(masks::CONTROL) {
            f.write_str("<control>")?;
        }
        if self.modifiers.contains(masks::ALT) {
            f.write_str("<alt>")?;
        }
        if self.modifiers.contains(masks::SHIFT) {
            f.write_str("<shift>")?;
        }
        if self.modifiers.contains(masks::SUPER) {
            f.write_str("<super>")?;
        }
        write!(f, "{}", self.key)
    }
}

impl Serialize for KeyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let key: KeyId = "F10".parse().unwrap();
        assert!(key.modifiers.is_empty());
        assert_eq!(key.key, KeyName::Sym("F10".to_string()));
    }

    #[test]
    fn test_modifier_order_does_not_matter() {
        let a: KeyId = "<alt><shift>Tab".parse().unwrap();
        let b: KeyId = "<shift><alt>Tab".parse().unwrap();
        assert_eq!(a, b);
        assert!(a.modifiers.contains(masks::ALT | masks::SHIFT));
    }

    #[test]
    fn test_raw_keycodes() {
        let hex: KeyId = "0x93".parse().unwrap();
        let dec: KeyId = "147".parse().unwrap();
        assert_eq!(hex, dec);
        assert_eq!(hex.key, KeyName::Code(0x93));
        assert_eq!(hex.to_string(), "0x93");
    }

    #[test]
    fn test_single_digit_is_keysym() {
        let key: KeyId = "<alt>1".parse().unwrap();
        assert_eq!(key.key, KeyName::Sym("1".to_string()));
    }

    #[test]
    fn test_canonical_display() {
        let key: KeyId = "<shift><ctrl><alt>q".parse().unwrap();
        assert_eq!(key.to_string(), "<control><alt><shift>q");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<KeyId>(), Err(KeyParseError::Empty));
        assert!(matches!("<alt>".parse::<KeyId>(), Err(KeyParseError::NoKey(_))));
        assert!(matches!(
            "<hyper>a".parse::<KeyId>(),
            Err(KeyParseError::UnknownModifier(_))
        ));
        assert!(matches!("<alt".parse::<KeyId>(), Err(KeyParseError::Unterminated(_))));
        assert!(matches!("0xZZ".parse::<KeyId>(), Err(KeyParseError::InvalidKeycode(_))));
    }

    #[test]
    fn test_lock_bits_ignored() {
        let state = masks::ALT | masks::LOCK | masks::NUM_LOCK;
        assert_eq!(state.normalized(), masks::ALT);
    }

    #[test]
    fn test_modifier_mask_from_str() {
        assert_eq!("alt".parse::<ModifierMask>().unwrap(), masks::ALT);
        assert_eq!("<super>".parse::<ModifierMask>().unwrap(), masks::SUPER);
        assert!("meta".parse::<ModifierMask>().is_err());
    }

    #[test]
    fn test_serde_uses_identifier_string() {
        let key: KeyId = "<alt>Escape".parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#""<alt>Escape""#);
        let back: KeyId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
