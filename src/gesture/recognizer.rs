//! Gesture recognizer
//!
//! Maps raw key events to the popup shortcut and the custom-action
//! shortcuts. Runs inside the tap callback, so every path here is a few
//! comparisons and a non-blocking channel send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::events::Gesture;
use super::guard::{Gate, SyntheticCopyFlag};
use crate::interceptor::{Disposition, KeyEvent, KeyKind};
use crate::shortcut::{KeyboardShortcut, PressMode};

/// Timing constants of the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTiming {
    /// Maximum gap between the two presses of a double press
    pub double_press_interval: Duration,
    /// How long the popup guard stays up after a trigger
    pub popup_hold: Duration,
    /// How long the custom-action guard stays up after a trigger
    pub custom_action_hold: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            double_press_interval: Duration::from_millis(500),
            popup_hold: Duration::from_millis(500),
            custom_action_hold: Duration::from_millis(200),
        }
    }
}

/// Whether this process is the frontmost application
pub trait AppActivity: Send + Sync {
    fn is_active(&self) -> bool;
}

/// `AppActivity` driven by the host UI's activation notifications
#[derive(Debug, Default)]
pub struct ActivityFlag(AtomicBool);

impl ActivityFlag {
    pub fn new(active: bool) -> Self {
        Self(AtomicBool::new(active))
    }

    pub fn set(&self, active: bool) {
        self.0.store(active, Ordering::SeqCst);
    }
}

impl AppActivity for ActivityFlag {
    fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Popup binding and gate state
struct RecognizerState {
    popup_shortcut: KeyboardShortcut,
    press_mode: PressMode,
    popup: Gate,
    custom_action: Gate,
}

/// Recognizes configured shortcuts in the raw key stream
pub struct GestureRecognizer {
    state: Mutex<RecognizerState>,
    timing: GestureTiming,
    custom_actions_enabled: AtomicBool,
    activity: Arc<dyn AppActivity>,
    synthetic_copy: SyntheticCopyFlag,
    gesture_tx: mpsc::Sender<Gesture>,
}

impl GestureRecognizer {
    /// Create a recognizer for the given popup binding
    pub fn new(
        popup_shortcut: KeyboardShortcut,
        press_mode: PressMode,
        timing: GestureTiming,
        activity: Arc<dyn AppActivity>,
        synthetic_copy: SyntheticCopyFlag,
        gesture_tx: mpsc::Sender<Gesture>,
    ) -> Self {
        Self {
            state: Mutex::new(RecognizerState {
                popup_shortcut,
                press_mode,
                popup: Gate::new(timing.popup_hold),
                custom_action: Gate::new(timing.custom_action_hold),
            }),
            timing,
            custom_actions_enabled: AtomicBool::new(false),
            activity,
            synthetic_copy,
            gesture_tx,
        }
    }

    pub fn popup_shortcut(&self) -> KeyboardShortcut {
        self.lock().popup_shortcut
    }

    pub fn press_mode(&self) -> PressMode {
        self.lock().press_mode
    }

    /// Replace the popup binding wholesale. Callers validate first.
    pub fn set_binding(&self, shortcut: KeyboardShortcut, mode: PressMode) {
        let mut state = self.lock();
        state.popup_shortcut = shortcut;
        state.press_mode = mode;
        state.popup.reset();
        info!(%shortcut, %mode, "popup binding updated");
    }

    pub fn custom_actions_enabled(&self) -> bool {
        self.custom_actions_enabled.load(Ordering::SeqCst)
    }

    pub fn set_custom_actions_enabled(&self, enabled: bool) {
        self.custom_actions_enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "custom action hotkeys toggled");
    }

    /// Handle a key event from the tap
    pub fn handle_key(&self, event: &KeyEvent) -> Disposition {
        self.handle_key_at(event, Instant::now())
    }

    /// Handle a key event as if it arrived at `now`
    pub fn handle_key_at(&self, event: &KeyEvent, now: Instant) -> Disposition {
        if event.kind != KeyKind::Down || event.is_repeat {
            return Disposition::Pass;
        }

        if self.synthetic_copy.is_raised_at(now) {
            trace!(key_code = event.key_code, "ignoring key during synthetic copy");
            return Disposition::Pass;
        }

        let shortcut = event.shortcut();
        let mut state = self.lock();

        if shortcut == state.popup_shortcut {
            return self.on_popup(&mut state, now);
        }

        if let Some(index) = shortcut.custom_action_index() {
            return self.on_custom_action(&mut state, index, now);
        }

        Disposition::Pass
    }

    fn on_popup(&self, state: &mut RecognizerState, now: Instant) -> Disposition {
        match state.press_mode {
            PressMode::SinglePress => {
                if state.popup.is_processing(now) {
                    debug!("popup shortcut ignored, previous trigger still processing");
                    return Disposition::Swallow;
                }
                state.popup.begin(now);
                self.emit(Gesture::Popup);
                Disposition::Swallow
            }
            PressMode::DoublePress => {
                if state.popup.is_processing(now) {
                    return Disposition::Pass;
                }
                if state
                    .popup
                    .armed_within(now, self.timing.double_press_interval)
                {
                    state.popup.begin(now);
                    self.emit(Gesture::Popup);
                    Disposition::Swallow
                } else {
                    // First press keeps its normal meaning
                    state.popup.arm(now);
                    trace!("popup shortcut first press recorded");
                    Disposition::Pass
                }
            }
        }
    }

    fn on_custom_action(
        &self,
        state: &mut RecognizerState,
        index: usize,
        now: Instant,
    ) -> Disposition {
        if !self.custom_actions_enabled() || !self.activity.is_active() {
            return Disposition::Pass;
        }
        if state.custom_action.is_processing(now) {
            return Disposition::Swallow;
        }
        state.custom_action.begin(now);
        self.emit(Gesture::CustomAction { index });
        Disposition::Swallow
    }

    fn emit(&self, gesture: Gesture) {
        info!(%gesture, "gesture recognized");
        match self.gesture_tx.try_send(gesture) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%gesture, "gesture channel full, dropping gesture");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%gesture, "gesture channel closed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecognizerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
