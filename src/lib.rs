//! selection-hotkeyd: global hotkeys that capture the selected text of the
//! focused application
//!
//! - Global keyboard interception with retry and re-enable
//! - Popup (single or double press) and custom action (⌘1..⌘5) gestures
//! - Selection capture through accessibility, with a clipboard fallback
//!   that always restores the user's clipboard
//! - Delivery to consumers on the UI-owning loop

pub mod clipboard;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod interceptor;
pub mod lifecycle;
#[cfg(target_os = "macos")]
pub mod platform;
pub mod selection;
pub mod service;
pub mod shortcut;

pub use config::{Config, HotkeySettings};
pub use service::{HotkeyService, Platform};
