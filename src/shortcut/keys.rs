//! Modifier key definitions and virtual key codes
//!
//! Provides the normalized modifier bit set shared by shortcuts read from
//! raw event-tap flags and shortcuts recorded from UI modifier flags, plus
//! the macOS virtual key codes the shortcut model refers to.

use bitflags::bitflags;

/// Raw modifier masks as reported by the event tap (CGEventFlags)
pub mod event_flags {
    /// Shift key modifier flag
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control key modifier flag
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt key modifier flag
    pub const OPTION: u64 = 0x0008_0000;
    /// Command key modifier flag
    pub const COMMAND: u64 = 0x0010_0000;
}

/// Modifier masks as reported by UI key events (NSEvent.ModifierFlags)
pub mod ui_flags {
    pub const SHIFT: u64 = 1 << 17;
    pub const CONTROL: u64 = 1 << 18;
    pub const OPTION: u64 = 1 << 19;
    pub const COMMAND: u64 = 1 << 20;
}

bitflags! {
    /// Set of modifier keys held with a key press
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ModifierSet: u32 {
        const COMMAND = 1 << 0;
        const SHIFT = 1 << 1;
        const OPTION = 1 << 2;
        const CONTROL = 1 << 3;
    }
}

impl ModifierSet {
    /// Build a modifier set from raw event-tap flags.
    ///
    /// Device-dependent side bits, caps lock, and numeric pad bits are dropped.
    pub fn from_event_flags(flags: u64) -> Self {
        Self::from_masks(
            flags,
            [
                (event_flags::COMMAND, Self::COMMAND),
                (event_flags::SHIFT, Self::SHIFT),
                (event_flags::OPTION, Self::OPTION),
                (event_flags::CONTROL, Self::CONTROL),
            ],
        )
    }

    /// Build a modifier set from UI modifier flags
    pub fn from_ui_flags(flags: u64) -> Self {
        Self::from_masks(
            flags,
            [
                (ui_flags::COMMAND, Self::COMMAND),
                (ui_flags::SHIFT, Self::SHIFT),
                (ui_flags::OPTION, Self::OPTION),
                (ui_flags::CONTROL, Self::CONTROL),
            ],
        )
    }

    /// Convert back to raw event-tap flags, used when synthesizing events
    pub fn to_event_flags(self) -> u64 {
        let mut flags = 0;
        if self.contains(Self::COMMAND) {
            flags |= event_flags::COMMAND;
        }
        if self.contains(Self::SHIFT) {
            flags |= event_flags::SHIFT;
        }
        if self.contains(Self::OPTION) {
            flags |= event_flags::OPTION;
        }
        if self.contains(Self::CONTROL) {
            flags |= event_flags::CONTROL;
        }
        flags
    }

    /// Display glyphs in the conventional ⌃⌥⇧⌘ order
    pub fn glyphs(self) -> String {
        let mut out = String::new();
        if self.contains(Self::CONTROL) {
            out.push('⌃');
        }
        if self.contains(Self::OPTION) {
            out.push('⌥');
        }
        if self.contains(Self::SHIFT) {
            out.push('⇧');
        }
        if self.contains(Self::COMMAND) {
            out.push('⌘');
        }
        out
    }

    fn from_masks(flags: u64, masks: [(u64, Self); 4]) -> Self {
        masks
            .into_iter()
            .filter(|(mask, _)| flags & mask != 0)
            .fold(Self::empty(), |acc, (_, bit)| acc | bit)
    }
}

/// macOS virtual key codes (ANSI layout)
pub mod keycode {
    pub const A: u16 = 0x00;
    pub const C: u16 = 0x08;
    pub const V: u16 = 0x09;
    pub const X: u16 = 0x07;
    pub const Z: u16 = 0x06;
    pub const Q: u16 = 0x0C;
    pub const W: u16 = 0x0D;
    pub const DIGIT_1: u16 = 0x12;
    pub const DIGIT_2: u16 = 0x13;
    pub const DIGIT_3: u16 = 0x14;
    pub const DIGIT_4: u16 = 0x15;
    pub const DIGIT_5: u16 = 0x17;
    pub const TAB: u16 = 0x30;
    pub const SPACE: u16 = 0x31;
    pub const GRAVE: u16 = 0x32;
    pub const ESCAPE: u16 = 0x35;
}

/// Key codes of the custom-action digits, in index order (⌘1 is index 1)
pub const CUSTOM_ACTION_KEYS: [u16; 5] = [
    keycode::DIGIT_1,
    keycode::DIGIT_2,
    keycode::DIGIT_3,
    keycode::DIGIT_4,
    keycode::DIGIT_5,
];

/// Human-readable name of a virtual key code
pub fn key_name(code: u16) -> String {
    let name = match code {
        0x00 => "A",
        0x01 => "S",
        0x02 => "D",
        0x03 => "F",
        0x04 => "H",
        0x05 => "G",
        0x06 => "Z",
        0x07 => "X",
        0x08 => "C",
        0x09 => "V",
        0x0B => "B",
        0x0C => "Q",
        0x0D => "W",
        0x0E => "E",
        0x0F => "R",
        0x10 => "Y",
        0x11 => "T",
        0x12 => "1",
        0x13 => "2",
        0x14 => "3",
        0x15 => "4",
        0x16 => "6",
        0x17 => "5",
        0x18 => "=",
        0x19 => "9",
        0x1A => "7",
        0x1B => "-",
        0x1C => "8",
        0x1D => "0",
        0x1E => "]",
        0x1F => "O",
        0x20 => "U",
        0x21 => "[",
        0x22 => "I",
        0x23 => "P",
        0x24 => "Return",
        0x25 => "L",
        0x26 => "J",
        0x27 => "'",
        0x28 => "K",
        0x29 => ";",
        0x2A => "\\",
        0x2B => ",",
        0x2C => "/",
        0x2D => "N",
        0x2E => "M",
        0x2F => ".",
        0x30 => "Tab",
        0x31 => "Space",
        0x32 => "`",
        0x33 => "Delete",
        0x35 => "Esc",
        0x7A => "F1",
        0x78 => "F2",
        0x63 => "F3",
        0x76 => "F4",
        0x60 => "F5",
        0x61 => "F6",
        0x62 => "F7",
        0x64 => "F8",
        0x65 => "F9",
        0x6D => "F10",
        0x67 => "F11",
        0x6F => "F12",
        other => return format!("Key{}", other),
    };
    name.to_string()
}
