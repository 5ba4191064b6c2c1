//! External display configuration tools
//!
//! Screen rotation is applied with two X tools: `xmodmap` remaps the d-pad
//! keycodes and `xrandr` turns the screen.

use std::fmt;
use std::io;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Screen orientation names as understood by `xrandr -o`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Normal,
    Left,
    Inverted,
    Right,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::Left => "left",
            Orientation::Inverted => "inverted",
            Orientation::Right => "right",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from running a display tool
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

impl DisplayError {
    /// The tool was interrupted by a signal before it could report back
    pub fn is_interrupted(&self) -> bool {
        matches!(self, DisplayError::Spawn { source, .. } if source.kind() == io::ErrorKind::Interrupted)
    }
}

/// Display configuration commands used by rotation
pub trait DisplayTools: Send {
    /// Bind each keycode to the given keysym
    fn remap_keys(&mut self, mappings: &[(u32, &str)]) -> Result<(), DisplayError>;

    /// Turn the screen to `orientation`
    fn set_orientation(&mut self, orientation: Orientation) -> Result<(), DisplayError>;
}

/// `xmodmap` and `xrandr` invoked as blocking subprocesses
#[derive(Debug, Clone)]
pub struct XDisplayTools {
    xmodmap: String,
    xrandr: String,
}

impl XDisplayTools {
    pub fn new(xmodmap: impl Into<String>, xrandr: impl Into<String>) -> Self {
        Self {
            xmodmap: xmodmap.into(),
            xrandr: xrandr.into(),
        }
    }

    fn run(program: &str, args: &[String]) -> Result<(), DisplayError> {
        debug!(program, ?args, "running display tool");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| DisplayError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DisplayError::Failed {
                program: program.to_string(),
                status: status.to_string(),
            })
        }
    }
}

/// `-e "keycode N = SYM"` pairs for xmodmap
fn xmodmap_args(mappings: &[(u32, &str)]) -> Vec<String> {
    mappings
        .iter()
        .flat_map(|(keycode, keysym)| ["-e".to_string(), format!("keycode {} = {}", keycode, keysym)])
        .collect()
}

impl DisplayTools for XDisplayTools {
    fn remap_keys(&mut self, mappings: &[(u32, &str)]) -> Result<(), DisplayError> {
        Self::run(&self.xmodmap, &xmodmap_args(mappings))
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<(), DisplayError> {
        Self::run(&self.xrandr, &["-o".to_string(), orientation.to_string()])
    }
}
