use objc2_app_kit::NSRunningApplication;

use crate::gesture::AppActivity;

/// Asks AppKit whether this process is the frontmost application
pub struct MacAppActivity;

impl AppActivity for MacAppActivity {
    fn is_active(&self) -> bool {
        unsafe { NSRunningApplication::currentApplication().isActive() }
    }
}
