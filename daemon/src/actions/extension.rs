//! Global key extensions
//!
//! An extension declares the keys it wants and handles presses of them in
//! place of a built-in action. Extensions are either linked in and passed to
//! `ActionTable::register_extension`, or declared as TOML units in the
//! extensions directory:
//!
//! ```toml
//! name = "screenshot"
//! keys = ["<alt>1"]
//! command = ["/usr/bin/take-screenshot", "--key"]
//! ```
//!
//! A unit's command is spawned with the pressed key identifier appended.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::hotkey::{KeyId, KeyParseError};

use super::table::ActionTable;

/// A handler bound to one or more keys
pub trait Extension: Send {
    fn name(&self) -> &str;

    /// Keys this extension wants bound to it
    fn bound_keys(&self) -> Vec<KeyId>;

    /// Called for each press of a bound key
    fn handle_key_press(&mut self, key: &KeyId) -> Result<(), ExtensionError>;
}

/// Errors from loading or running extensions
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension {extension}: key {key} is already bound")]
    Duplicate { extension: String, key: KeyId },

    #[error("extension {extension} declares no keys")]
    NoKeys { extension: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid key {key:?} in {}: {source}", path.display())]
    InvalidKey {
        path: PathBuf,
        key: String,
        #[source]
        source: KeyParseError,
    },

    #[error("extension {extension} has an empty command")]
    EmptyCommand { extension: String },

    #[error("extension {extension} failed to start: {source}")]
    Spawn {
        extension: String,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk form of an extension unit
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtensionUnit {
    name: Option<String>,
    keys: Vec<String>,
    command: Vec<String>,
}

/// Extension that runs a command for each key press
#[derive(Debug, Clone)]
pub struct CommandExtension {
    name: String,
    keys: Vec<KeyId>,
    argv: Vec<String>,
}

impl CommandExtension {
    pub fn new(name: impl Into<String>, keys: Vec<KeyId>, argv: Vec<String>) -> Self {
        Self {
            name: name.into(),
            keys,
            argv,
        }
    }

    /// Parse a TOML unit; the name defaults to the file stem
    pub fn from_file(path: &Path) -> Result<Self, ExtensionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ExtensionError::Read {
            path: path.to_owned(),
            source,
        })?;
        let unit: ExtensionUnit = toml::from_str(&raw).map_err(|source| ExtensionError::Parse {
            path: path.to_owned(),
            source,
        })?;

        let keys = unit
            .keys
            .iter()
            .map(|key| {
                key.parse().map_err(|source| ExtensionError::InvalidKey {
                    path: path.to_owned(),
                    key: key.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<KeyId>, _>>()?;

        let name = unit.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        if unit.command.is_empty() {
            return Err(ExtensionError::EmptyCommand { extension: name });
        }

        Ok(Self::new(name, keys, unit.command))
    }
}

impl Extension for CommandExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn bound_keys(&self) -> Vec<KeyId> {
        self.keys.clone()
    }

    fn handle_key_press(&mut self, key: &KeyId) -> Result<(), ExtensionError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| ExtensionError::EmptyCommand {
                extension: self.name.clone(),
            })?;

        let mut child = Command::new(program)
            .args(args)
            .arg(key.to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ExtensionError::Spawn {
                extension: self.name.clone(),
                source,
            })?;

        debug!(extension = %self.name, pid = ?child.id(), %key, "extension command started");

        let name = self.name.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!(extension = %name, %status, "extension command failed"),
                Ok(_) => {}
                Err(e) => warn!(extension = %name, ?e, "failed to wait for extension command"),
            }
        });

        Ok(())
    }
}

/// Outcome of scanning the extensions directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub skipped: usize,
}

/// Load every `*.toml` unit in `dir` into the table, in file name order
///
/// A unit that fails to parse or collides with an existing binding is logged
/// and skipped; the rest still load.
pub fn load_extensions(dir: &Path, table: &mut ActionTable) -> LoadSummary {
    let mut summary = LoadSummary::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?dir, "no extensions directory");
            return summary;
        }
        Err(e) => {
            error!(?dir, ?e, "failed to read extensions directory");
            return summary;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| is_extension_unit(path))
        .collect();
    paths.sort();

    for path in paths {
        debug!(?path, "loading extension");
        let result = CommandExtension::from_file(&path)
            .and_then(|extension| table.register_extension(Box::new(extension)).map(|_| ()));

        match result {
            Ok(()) => {
                let stem = path.file_stem().unwrap_or_default();
                summary.loaded.push(stem.to_string_lossy().into_owned());
            }
            Err(e) => {
                error!(?path, error = %e, "failed to load extension");
                summary.skipped += 1;
            }
        }
    }

    info!(loaded = summary.loaded.len(), skipped = summary.skipped, "extensions loaded");
    summary
}

fn is_extension_unit(path: &Path) -> bool {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("__"));
    is_toml && !hidden && path.is_file()
}
