//! Host OS implementations of the tap, accessibility, input, pasteboard
//! and activity seams

pub mod macos;
