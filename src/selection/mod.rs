//! Selection capture from the focused application
//!
//! Accessibility introspection is tried first; the clipboard fallback
//! synthesizes a copy and always hands the clipboard back.

mod extractor;
mod payload;

pub use extractor::{
    Accessibility, AxSelection, InjectError, InputInjector, SelectionExtractor, SharedPasteboard,
    DEFAULT_SETTLE_DELAY, MAX_SETTLE_DELAY,
};
pub use payload::{payload_from_pasteboard, AttributedText, BasicCodec, RichTextCodec, RichTextPayload};
