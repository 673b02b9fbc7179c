//! Clipboard access and snapshotting
//!
//! The system clipboard is shared by every process. The only writer in this
//! crate is the selection fallback, which brackets its synthetic copy with a
//! snapshot capture and restore.

mod memory;
mod snapshot;

pub use memory::MemoryPasteboard;
pub use snapshot::{
    Pasteboard, PasteboardError, PasteboardItem, PasteboardSnapshot, PasteboardValue, HTML_TYPE,
    PLAIN_TEXT_TYPE, RTF_TYPE,
};
