//! Synthetic copy via CGEvent

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use tracing::trace;

use crate::selection::{InjectError, InputInjector};
use crate::shortcut::{keycode, ModifierSet};

/// Posts ⌘C to the HID event stream
pub struct MacInjector;

impl InputInjector for MacInjector {
    fn post_copy(&self) -> Result<(), InjectError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InjectError::EventSource)?;

        let flags = CGEventFlags::from_bits_truncate(ModifierSet::COMMAND.to_event_flags());

        let key_down = CGEvent::new_keyboard_event(source.clone(), keycode::C, true)
            .map_err(|_| InjectError::EventCreation)?;
        key_down.set_flags(flags);

        let key_up = CGEvent::new_keyboard_event(source, keycode::C, false)
            .map_err(|_| InjectError::EventCreation)?;
        key_up.set_flags(flags);

        key_down.post(CGEventTapLocation::HID);
        key_up.post(CGEventTapLocation::HID);
        trace!("synthetic copy posted");
        Ok(())
    }
}
