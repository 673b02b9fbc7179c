//! Gestures emitted by the recognizer
//!
//! The recognizer only decides *that* something should happen; the pipeline
//! task turns each gesture into an extraction and a delivery.

/// A recognized hotkey gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// The popup shortcut fired: capture the selection
    Popup,

    /// A custom-action shortcut fired
    CustomAction {
        /// 1-based index of the action (⌘1 is 1)
        index: usize,
    },
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gesture::Popup => write!(f, "POPUP"),
            Gesture::CustomAction { index } => write!(f, "CUSTOM_ACTION ({})", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Gesture::Popup.to_string(), "POPUP");
        assert_eq!(Gesture::CustomAction { index: 2 }.to_string(), "CUSTOM_ACTION (2)");
    }
}
