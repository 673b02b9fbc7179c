//! Shortcut values and validation rules
//!
//! A shortcut is an immutable key code + modifier pair. Validation keeps the
//! popup shortcut away from combinations the system or this daemon already
//! owns.

use std::fmt;

use super::keys::{key_name, keycode, ModifierSet, CUSTOM_ACTION_KEYS};

/// A key code pressed together with a set of modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyboardShortcut {
    pub key_code: u16,
    pub modifiers: ModifierSet,
}

impl KeyboardShortcut {
    pub const fn new(key_code: u16, modifiers: ModifierSet) -> Self {
        Self {
            key_code,
            modifiers,
        }
    }

    /// Build a shortcut from a key code and raw event-tap flags
    pub fn from_event(key_code: u16, flags: u64) -> Self {
        Self::new(key_code, ModifierSet::from_event_flags(flags))
    }

    /// Build a shortcut from a key code and UI modifier flags
    pub fn from_ui(key_code: u16, flags: u64) -> Self {
        Self::new(key_code, ModifierSet::from_ui_flags(flags))
    }

    /// ⌘ + the given key
    pub const fn command(key_code: u16) -> Self {
        Self::new(key_code, ModifierSet::COMMAND)
    }

    /// The default popup shortcut: ⌘C
    pub const fn default_popup() -> Self {
        Self::command(keycode::C)
    }

    /// Shortcut for the 1-based custom action index, if one exists
    pub fn custom_action(index: usize) -> Option<Self> {
        let key = *CUSTOM_ACTION_KEYS.get(index.checked_sub(1)?)?;
        Some(Self::command(key))
    }

    /// 1-based custom action index this shortcut triggers, if any
    pub fn custom_action_index(&self) -> Option<usize> {
        if self.modifiers != ModifierSet::COMMAND {
            return None;
        }
        CUSTOM_ACTION_KEYS
            .iter()
            .position(|&key| key == self.key_code)
            .map(|i| i + 1)
    }
}

impl Default for KeyboardShortcut {
    fn default() -> Self {
        Self::default_popup()
    }
}

impl fmt::Display for KeyboardShortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.modifiers.glyphs(), key_name(self.key_code))
    }
}

/// How presses of the popup shortcut are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PressMode {
    /// Every press triggers
    SinglePress,
    /// Two presses within the double-press interval trigger
    #[default]
    DoublePress,
}

impl PressMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressMode::SinglePress => "single_press",
            PressMode::DoublePress => "double_press",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single_press" => Some(PressMode::SinglePress),
            "double_press" => Some(PressMode::DoublePress),
            _ => None,
        }
    }
}

impl fmt::Display for PressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a proposed popup shortcut is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{shortcut} must include the Command (⌘) key")]
    MissingCommand { shortcut: KeyboardShortcut },

    #[error("{shortcut} is reserved for custom action {index}")]
    CustomAction {
        shortcut: KeyboardShortcut,
        index: usize,
    },

    #[error("{shortcut} is reserved by the system ({purpose})")]
    System {
        shortcut: KeyboardShortcut,
        purpose: &'static str,
    },

    #[error("{shortcut} would override {purpose} in single-press mode; use double-press or another key")]
    EditingShortcut {
        shortcut: KeyboardShortcut,
        purpose: &'static str,
    },
}

const CMD: ModifierSet = ModifierSet::COMMAND;
const CMD_SHIFT: ModifierSet = ModifierSet::COMMAND.union(ModifierSet::SHIFT);
const CMD_OPTION: ModifierSet = ModifierSet::COMMAND.union(ModifierSet::OPTION);

/// Combinations owned by the operating system
const SYSTEM_RESERVED: &[(KeyboardShortcut, &str)] = &[
    (KeyboardShortcut::new(keycode::SPACE, CMD), "input source / search"),
    (KeyboardShortcut::new(keycode::TAB, CMD), "application switcher"),
    (KeyboardShortcut::new(keycode::GRAVE, CMD), "window switcher"),
    (KeyboardShortcut::new(keycode::DIGIT_3, CMD_SHIFT), "screenshot"),
    (KeyboardShortcut::new(keycode::DIGIT_4, CMD_SHIFT), "screenshot of selection"),
    (KeyboardShortcut::new(keycode::DIGIT_5, CMD_SHIFT), "screenshot toolbar"),
    (KeyboardShortcut::new(keycode::Q, CMD), "quit"),
    (KeyboardShortcut::new(keycode::ESCAPE, CMD_OPTION), "force quit"),
];

/// Editing shortcuts that a single-press popup shortcut would shadow
const EDITING_SHORTCUTS: &[(KeyboardShortcut, &str)] = &[
    (KeyboardShortcut::new(keycode::C, CMD), "copy"),
    (KeyboardShortcut::new(keycode::V, CMD), "paste"),
    (KeyboardShortcut::new(keycode::X, CMD), "cut"),
    (KeyboardShortcut::new(keycode::Z, CMD), "undo"),
    (KeyboardShortcut::new(keycode::A, CMD), "select all"),
    (KeyboardShortcut::new(keycode::W, CMD), "close window"),
];

fn lookup(table: &[(KeyboardShortcut, &'static str)], shortcut: &KeyboardShortcut) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| candidate == shortcut)
        .map(|&(_, purpose)| purpose)
}

/// Check whether `shortcut` may be used as the popup shortcut under `mode`
pub fn validate(shortcut: &KeyboardShortcut, mode: PressMode) -> Result<(), ValidationError> {
    let shortcut = *shortcut;

    if !shortcut.modifiers.contains(ModifierSet::COMMAND) {
        return Err(ValidationError::MissingCommand { shortcut });
    }

    if let Some(index) = shortcut.custom_action_index() {
        return Err(ValidationError::CustomAction { shortcut, index });
    }

    if let Some(purpose) = lookup(SYSTEM_RESERVED, &shortcut) {
        return Err(ValidationError::System { shortcut, purpose });
    }

    if mode == PressMode::SinglePress {
        if let Some(purpose) = lookup(EDITING_SHORTCUTS, &shortcut) {
            return Err(ValidationError::EditingShortcut { shortcut, purpose });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_command_c_double_press() {
        let shortcut = KeyboardShortcut::default();
        assert_eq!(shortcut.key_code, keycode::C);
        assert_eq!(shortcut.modifiers, ModifierSet::COMMAND);
        assert_eq!(PressMode::default(), PressMode::DoublePress);
        assert!(validate(&shortcut, PressMode::default()).is_ok());
    }

    #[test]
    fn test_rejects_missing_command() {
        let shortcut = KeyboardShortcut::new(keycode::C, ModifierSet::CONTROL);
        let err = validate(&shortcut, PressMode::DoublePress).unwrap_err();
        assert!(matches!(err, ValidationError::MissingCommand { .. }));
        assert!(err.to_string().contains("Command"));
    }

    #[test]
    fn test_rejects_custom_action_digits() {
        let err = validate(&KeyboardShortcut::command(keycode::DIGIT_1), PressMode::DoublePress)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::CustomAction {
                shortcut: KeyboardShortcut::command(keycode::DIGIT_1),
                index: 1,
            }
        );
    }

    #[test]
    fn test_rejects_system_combinations() {
        let space = KeyboardShortcut::command(keycode::SPACE);
        assert!(matches!(
            validate(&space, PressMode::DoublePress),
            Err(ValidationError::System { .. })
        ));

        let screenshot =
            KeyboardShortcut::new(keycode::DIGIT_3, ModifierSet::COMMAND | ModifierSet::SHIFT);
        let err = validate(&screenshot, PressMode::DoublePress).unwrap_err();
        assert!(err.to_string().contains("screenshot"));
    }

    #[test]
    fn test_every_system_combination_rejected_in_both_modes() {
        let cases = [
            (keycode::SPACE, CMD),
            (keycode::TAB, CMD),
            (keycode::GRAVE, CMD),
            (keycode::DIGIT_3, CMD_SHIFT),
            (keycode::DIGIT_4, CMD_SHIFT),
            (keycode::DIGIT_5, CMD_SHIFT),
            (keycode::Q, CMD),
            (keycode::ESCAPE, CMD_OPTION),
        ];
        assert_eq!(cases.len(), SYSTEM_RESERVED.len());

        for (key_code, modifiers) in cases {
            let shortcut = KeyboardShortcut::new(key_code, modifiers);
            for mode in [PressMode::SinglePress, PressMode::DoublePress] {
                assert!(
                    matches!(validate(&shortcut, mode), Err(ValidationError::System { .. })),
                    "{} accepted under {}",
                    shortcut,
                    mode
                );
            }
        }
    }

    #[test]
    fn test_editing_shortcuts_rejected_only_for_single_press() {
        let cases = [
            (keycode::C, "copy"),
            (keycode::V, "paste"),
            (keycode::X, "cut"),
            (keycode::Z, "undo"),
            (keycode::A, "select all"),
            (keycode::W, "close window"),
        ];
        assert_eq!(cases.len(), EDITING_SHORTCUTS.len());

        for (key_code, expected) in cases {
            let shortcut = KeyboardShortcut::command(key_code);
            match validate(&shortcut, PressMode::SinglePress) {
                Err(ValidationError::EditingShortcut { purpose, .. }) => {
                    assert_eq!(purpose, expected)
                }
                other => panic!("{} under single press gave {:?}", shortcut, other),
            }
            assert!(
                validate(&shortcut, PressMode::DoublePress).is_ok(),
                "{} rejected under double press",
                shortcut
            );
        }
    }

    #[test]
    fn test_command_c_only_rejected_for_single_press() {
        let copy = KeyboardShortcut::command(keycode::C);
        assert!(matches!(
            validate(&copy, PressMode::SinglePress),
            Err(ValidationError::EditingShortcut { purpose: "copy", .. })
        ));
        assert!(validate(&copy, PressMode::DoublePress).is_ok());
    }

    #[test]
    fn test_accepts_command_shift_key() {
        let shortcut = KeyboardShortcut::new(0x0E, ModifierSet::COMMAND | ModifierSet::SHIFT);
        assert!(validate(&shortcut, PressMode::SinglePress).is_ok());
    }

    #[test]
    fn test_custom_action_mapping() {
        assert_eq!(
            KeyboardShortcut::custom_action(5).and_then(|s| s.custom_action_index()),
            Some(5)
        );
        assert_eq!(KeyboardShortcut::custom_action(0), None);
        assert_eq!(KeyboardShortcut::custom_action(6), None);

        let shifted =
            KeyboardShortcut::new(keycode::DIGIT_2, ModifierSet::COMMAND | ModifierSet::SHIFT);
        assert_eq!(shifted.custom_action_index(), None);
    }

    #[test]
    fn test_display() {
        let shortcut = KeyboardShortcut::new(
            keycode::DIGIT_3,
            ModifierSet::COMMAND | ModifierSet::SHIFT,
        );
        assert_eq!(shortcut.to_string(), "⇧⌘3");
        assert_eq!(KeyboardShortcut::command(keycode::SPACE).to_string(), "⌘Space");
    }

    #[test]
    fn test_press_mode_strings() {
        assert_eq!(PressMode::parse("single_press"), Some(PressMode::SinglePress));
        assert_eq!(PressMode::parse("bogus"), None);
        assert_eq!(PressMode::DoublePress.to_string(), "double_press");
    }
}
