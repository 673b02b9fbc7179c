//! Platform-agnostic keyboard tap interface

use std::sync::Arc;

use super::event::{Disposition, TapEvent};

/// Called by the backend for every event, on the tap's own thread.
///
/// Must return quickly: the OS disables taps whose callbacks stall.
pub type TapCallback = Arc<dyn Fn(TapEvent) -> Disposition + Send + Sync>;

/// A global keyboard tap provided by the host OS.
///
/// The backend exclusively owns the OS handle. Implementations deliver key
/// events and disablement notifications to the installed callback and honor
/// its `Disposition`.
pub trait TapBackend: Send + Sync {
    /// Create the OS tap and start delivering events.
    ///
    /// Fails when the OS refuses the tap, commonly because the input
    /// monitoring or accessibility permission has not been granted.
    fn install(&self, callback: TapCallback) -> Result<(), TapError>;

    /// Enable or disable the installed tap without destroying it
    fn set_enabled(&self, enabled: bool);

    /// Destroy the tap. No callbacks run after this returns.
    fn uninstall(&self);
}

/// Errors that can occur while creating the tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("a tap is already installed")]
    AlreadyInstalled,

    #[error("failed to create event tap - check Accessibility and Input Monitoring permissions")]
    Creation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("failed to spawn tap thread: {0}")]
    ThreadSpawn(String),
}
