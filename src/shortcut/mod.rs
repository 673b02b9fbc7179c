//! Shortcut model: modifier sets, key codes, press modes, and validation
//!
//! Shortcut values are immutable and replaced wholesale when the user
//! reconfigures them.

mod keys;
mod model;

pub use keys::{event_flags, key_name, keycode, ui_flags, ModifierSet, CUSTOM_ACTION_KEYS};
pub use model::{validate, KeyboardShortcut, PressMode, ValidationError};
