//! macOS backends
//!
//! Every seam needs the Accessibility permission except the pasteboard and
//! the activity query. Without it the tap cannot be created and AX reads
//! come back empty.

mod accessibility;
mod activity;
mod injector;
mod pasteboard;
mod tap;

use std::sync::{Arc, Mutex};

pub use accessibility::MacAccessibility;
pub use activity::MacAppActivity;
pub use injector::MacInjector;
pub use pasteboard::MacPasteboard;
pub use tap::MacTap;

use crate::selection::BasicCodec;
use crate::service::Platform;

/// The full set of macOS backends
pub fn platform() -> Platform {
    Platform {
        tap: Arc::new(MacTap::new()),
        accessibility: Arc::new(MacAccessibility),
        injector: Arc::new(MacInjector),
        pasteboard: Arc::new(Mutex::new(MacPasteboard)),
        codec: Arc::new(BasicCodec),
        activity: Arc::new(MacAppActivity),
    }
}

/// Whether this process may use accessibility APIs
pub fn is_trusted() -> bool {
    unsafe { accessibility_sys::AXIsProcessTrusted() }
}
