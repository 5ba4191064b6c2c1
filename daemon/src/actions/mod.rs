//! Action table and extensions
//!
//! Maps key identifiers to built-in actions or extension handlers.

mod extension;
mod table;

pub use extension::{load_extensions, CommandExtension, Extension, ExtensionError, LoadSummary};
pub use table::{Action, ActionTable, BuiltinAction, DuplicateKeyError, ExtensionId};
