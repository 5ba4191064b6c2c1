//! Configuration loading and management
//!
//! Settings come from a TOML file (`$SHELL_KEYD_CONFIG`, or
//! `shell-keyd/config.toml` under the user config directory). A missing file
//! means all defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::dispatch::Limits;
use crate::hotkey::ModifierMask;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "SHELL_KEYD_CONFIG";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Directory scanned for extension units
    pub extensions_dir: PathBuf,

    /// Modifier held while tabbing between windows
    pub tabbing_modifier: String,

    #[serde(deserialize_with = "volume_level")]
    pub volume: LevelConfig,
    #[serde(deserialize_with = "brightness_level")]
    pub brightness: LevelConfig,
    pub speech: SpeechConfig,
    pub display: DisplayConfig,

    /// Keysym → keycode overrides for the key grabber
    pub keycodes: HashMap<String, u32>,
}

/// Step, maximum and starting value of a stepped level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelConfig {
    pub step: u32,
    pub max: u32,
    pub initial: u32,
}

impl LevelConfig {
    pub const VOLUME: LevelConfig = LevelConfig {
        step: 10,
        max: 100,
        initial: 50,
    };

    pub const BRIGHTNESS: LevelConfig = LevelConfig {
        step: 2,
        max: 15,
        initial: 15,
    };
}

/// A level section as written; missing fields fall back per level
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LevelSection {
    step: Option<u32>,
    max: Option<u32>,
    initial: Option<u32>,
}

impl LevelSection {
    fn over(self, defaults: LevelConfig) -> LevelConfig {
        let max = self.max.unwrap_or(defaults.max);
        LevelConfig {
            step: self.step.unwrap_or(defaults.step),
            max,
            initial: self.initial.unwrap_or(defaults.initial.min(max)),
        }
    }
}

fn volume_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LevelConfig, D::Error> {
    LevelSection::deserialize(deserializer).map(|section| section.over(LevelConfig::VOLUME))
}

fn brightness_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LevelConfig, D::Error> {
    LevelSection::deserialize(deserializer).map(|section| section.over(LevelConfig::BRIGHTNESS))
}

/// Commands used for the say-text key
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechConfig {
    /// Prints the primary selection on stdout
    pub selection_command: Vec<String>,
    /// Speaks text read from stdin
    pub say_command: Vec<String>,
}

/// Programs used for screen rotation
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub xmodmap: String,
    pub xrandr: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(std::env::temp_dir)
            .join("shell-keyd");
        let extensions_dir = dirs::config_dir()
            .unwrap_or_else(|| data_dir.clone())
            .join("shell-keyd")
            .join("globalkey");

        Self {
            socket_path: data_dir.join("daemon.sock"),
            data_dir,
            extensions_dir,
            tabbing_modifier: "alt".to_string(),
            volume: LevelConfig::VOLUME,
            brightness: LevelConfig::BRIGHTNESS,
            speech: SpeechConfig::default(),
            display: DisplayConfig::default(),
            keycodes: HashMap::new(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            selection_command: vec!["xsel".into(), "--output".into(), "--primary".into()],
            say_command: vec!["espeak".into(), "--stdin".into()],
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            xmodmap: "xmodmap".to_string(),
            xrandr: "xrandr".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Parse config text and check the values make sense
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("shell-keyd").join("config.toml")))
    }

    fn validate(&self) -> Result<()> {
        self.tabbing_modifier()?;
        for (name, level) in [("volume", &self.volume), ("brightness", &self.brightness)] {
            anyhow::ensure!(level.max > 0, "{} max must be positive", name);
            anyhow::ensure!(level.step > 0, "{} step must be positive", name);
            anyhow::ensure!(
                level.initial <= level.max,
                "{} initial {} exceeds max {}",
                name,
                level.initial,
                level.max
            );
        }
        Ok(())
    }

    /// The tabbing modifier as a mask
    pub fn tabbing_modifier(&self) -> Result<ModifierMask> {
        self.tabbing_modifier
            .parse()
            .with_context(|| format!("invalid tabbing modifier {:?}", self.tabbing_modifier))
    }

    pub fn limits(&self) -> Limits {
        Limits {
            volume_step: self.volume.step,
            volume_max: self.volume.max,
            brightness_step: self.brightness.step,
            brightness_max: self.brightness.max,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
