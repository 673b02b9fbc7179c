//! Raw events delivered by the keyboard tap

use crate::shortcut::{KeyboardShortcut, ModifierSet};

/// Key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Down,
    Up,
}

/// A classified keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: u16,
    pub modifiers: ModifierSet,
    pub kind: KeyKind,
    /// Generated by key auto-repeat rather than a fresh press
    pub is_repeat: bool,
}

impl KeyEvent {
    pub fn down(shortcut: KeyboardShortcut) -> Self {
        Self {
            key_code: shortcut.key_code,
            modifiers: shortcut.modifiers,
            kind: KeyKind::Down,
            is_repeat: false,
        }
    }

    pub fn up(shortcut: KeyboardShortcut) -> Self {
        Self {
            kind: KeyKind::Up,
            ..Self::down(shortcut)
        }
    }

    /// Build from the raw fields the OS tap reports
    pub fn from_raw(key_code: u16, flags: u64, kind: KeyKind, is_repeat: bool) -> Self {
        Self {
            key_code,
            modifiers: ModifierSet::from_event_flags(flags),
            kind,
            is_repeat,
        }
    }

    pub fn shortcut(&self) -> KeyboardShortcut {
        KeyboardShortcut::new(self.key_code, self.modifiers)
    }
}

/// Everything the OS tap can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapEvent {
    Key(KeyEvent),
    /// The OS disabled the tap because a callback took too long
    DisabledByTimeout,
    /// The tap was disabled by user input or another process
    DisabledByUserInput,
}

/// What the tap should do with the event it is holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the event unmodified to the OS
    Pass,
    /// Drop the event so the focused application never sees it
    Swallow,
}
