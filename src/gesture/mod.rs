//! Gesture recognition for the popup and custom-action hotkeys
//!
//! Provides one explicit gate per gesture class:
//! - Popup: single press, or double press within the interval
//! - CustomAction: ⌘1..⌘5 while the host enables them and is frontmost
//!
//! Gates release themselves after a bounded hold time.

mod events;
mod guard;
mod recognizer;

pub use events::Gesture;
pub use guard::{Gate, GateState, SyntheticCopyFlag, SyntheticCopyGuard, SYNTHETIC_COPY_MAX};
pub use recognizer::{ActivityFlag, AppActivity, GestureRecognizer, GestureTiming};
