//! Re-entrancy guards with time-based expiry
//!
//! Each gesture class owns a `Gate`. A gate in `Processing` falls back to
//! `Idle` once its hold time has passed, whether or not anything downstream
//! ever finished, so an abandoned extraction cannot wedge the recognizer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

/// Observable state of a gate at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Ready for a new gesture
    Idle,
    /// First press of a double press was recorded at this instant
    Armed { at: Instant },
    /// A gesture fired; further matches are ignored until the deadline
    Processing { until: Instant },
}

impl Default for GateState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Per-gesture-class guard
#[derive(Debug, Clone)]
pub struct Gate {
    state: GateState,
    hold: Duration,
}

impl Gate {
    pub fn new(hold: Duration) -> Self {
        Self {
            state: GateState::Idle,
            hold,
        }
    }

    /// State as seen at `now`, with expired processing reported as idle
    pub fn state_at(&self, now: Instant) -> GateState {
        match self.state {
            GateState::Processing { until } if now >= until => GateState::Idle,
            state => state,
        }
    }

    pub fn is_processing(&self, now: Instant) -> bool {
        matches!(self.state_at(now), GateState::Processing { .. })
    }

    /// Whether a first press was armed less than `interval` before `now`
    pub fn armed_within(&self, now: Instant, interval: Duration) -> bool {
        match self.state_at(now) {
            GateState::Armed { at } => now.saturating_duration_since(at) < interval,
            _ => false,
        }
    }

    /// Record a first press
    pub fn arm(&mut self, now: Instant) {
        trace!("gate armed");
        self.state = GateState::Armed { at: now };
    }

    /// Enter processing; released automatically after the hold time
    pub fn begin(&mut self, now: Instant) {
        trace!(hold_ms = self.hold.as_millis() as u64, "gate processing");
        self.state = GateState::Processing {
            until: now + self.hold,
        };
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }
}

/// Longest time the synthetic-copy flag may stay raised
pub const SYNTHETIC_COPY_MAX: Duration = Duration::from_secs(2);

/// Shared flag raised while the selection fallback injects its own copy
/// keystroke. The recognizer ignores all input while it is raised.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCopyFlag {
    raised_at: Arc<Mutex<Option<Instant>>>,
}

impl SyntheticCopyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag; it is lowered when the returned guard drops
    pub fn raise(&self) -> SyntheticCopyGuard {
        self.set(Some(Instant::now()));
        SyntheticCopyGuard { flag: self.clone() }
    }

    pub fn is_raised(&self) -> bool {
        self.is_raised_at(Instant::now())
    }

    /// Raised and not older than `SYNTHETIC_COPY_MAX`
    pub fn is_raised_at(&self, now: Instant) -> bool {
        match *self.lock() {
            Some(at) => now.saturating_duration_since(at) < SYNTHETIC_COPY_MAX,
            None => false,
        }
    }

    fn set(&self, value: Option<Instant>) {
        *self.lock() = value;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.raised_at.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lowers the synthetic-copy flag on drop
#[derive(Debug)]
pub struct SyntheticCopyGuard {
    flag: SyntheticCopyFlag,
}

impl Drop for SyntheticCopyGuard {
    fn drop(&mut self) {
        self.flag.set(None);
    }
}
