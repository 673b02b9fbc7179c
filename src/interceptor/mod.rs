//! Global keyboard interception
//!
//! The interceptor owns the OS tap through a `TapBackend`, keeps it alive
//! through creation failures and OS disablement, and routes key events to
//! the gesture recognizer.

mod backend;
mod controller;
mod event;

pub use backend::{TapBackend, TapCallback, TapError};
pub use controller::{EventInterceptor, InterceptorState, RetryPolicy};
pub use event::{Disposition, KeyEvent, KeyKind, TapEvent};
