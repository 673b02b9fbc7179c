//! Hotkey service
//!
//! Wires the recognizer, the interceptor, the extractor and the dispatcher
//! together, and is the one surface a host application talks to.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, HotkeySettings};
use crate::dispatch::{self, Dispatcher, UiLoop};
use crate::gesture::{AppActivity, Gesture, GestureRecognizer, SyntheticCopyFlag};
use crate::interceptor::{EventInterceptor, InterceptorState, TapBackend};
use crate::selection::{
    Accessibility, InputInjector, RichTextCodec, RichTextPayload, SelectionExtractor,
    SharedPasteboard,
};
use crate::shortcut::{validate, KeyboardShortcut, PressMode, ValidationError};

/// Gestures queued between the tap thread and the pipeline
const GESTURE_QUEUE: usize = 16;

/// OS seams the service runs against
pub struct Platform {
    pub tap: Arc<dyn TapBackend>,
    pub accessibility: Arc<dyn Accessibility>,
    pub injector: Arc<dyn InputInjector>,
    pub pasteboard: SharedPasteboard,
    pub codec: Arc<dyn RichTextCodec>,
    pub activity: Arc<dyn AppActivity>,
}

const ACTIVITY_UNREPORTED: u8 = 0;
const ACTIVITY_INACTIVE: u8 = 1;
const ACTIVITY_ACTIVE: u8 = 2;

/// Frontmost-ness as last reported by the host, else as the OS answers
struct HostActivity {
    reported: AtomicU8,
    platform: Arc<dyn AppActivity>,
}

impl AppActivity for HostActivity {
    fn is_active(&self) -> bool {
        match self.reported.load(Ordering::SeqCst) {
            ACTIVITY_ACTIVE => true,
            ACTIVITY_INACTIVE => false,
            _ => self.platform.is_active(),
        }
    }
}

/// The selection hotkey service
pub struct HotkeyService {
    config: Config,
    binding: Mutex<HotkeySettings>,
    activity: Arc<HostActivity>,
    recognizer: Arc<GestureRecognizer>,
    interceptor: EventInterceptor,
    extractor: SelectionExtractor,
    dispatcher: Dispatcher,
    gesture_rx: Mutex<Option<mpsc::Receiver<Gesture>>>,
    pipeline: Mutex<Option<JoinHandle<()>>>,
}

impl HotkeyService {
    /// Build the service from persisted settings.
    ///
    /// Returns the UI loop that delivers to registered consumers; the host
    /// drives it on the thread that owns its UI state.
    pub fn new(config: Config, platform: Platform) -> (Self, UiLoop) {
        let binding = startup_binding(config.load_settings());
        let (dispatcher, ui_loop) = dispatch::channel();
        let (gesture_tx, gesture_rx) = mpsc::channel(GESTURE_QUEUE);
        let synthetic_copy = SyntheticCopyFlag::new();

        let activity = Arc::new(HostActivity {
            reported: AtomicU8::new(ACTIVITY_UNREPORTED),
            platform: platform.activity,
        });

        let recognizer = Arc::new(GestureRecognizer::new(
            binding.shortcut,
            binding.press_mode,
            config.timing,
            activity.clone(),
            synthetic_copy.clone(),
            gesture_tx,
        ));

        let interceptor = EventInterceptor::new(platform.tap, recognizer.clone(), config.retry);

        let extractor = SelectionExtractor::new(
            platform.accessibility,
            platform.injector,
            platform.pasteboard,
            platform.codec,
            synthetic_copy,
        )
        .with_settle_delay(config.settle_delay);

        let service = Self {
            config,
            binding: Mutex::new(binding),
            activity,
            recognizer,
            interceptor,
            extractor,
            dispatcher,
            gesture_rx: Mutex::new(Some(gesture_rx)),
            pipeline: Mutex::new(None),
        };
        (service, ui_loop)
    }

    /// Register the consumer for captured selections
    pub fn on_popup_hotkey(&self, consumer: impl FnMut(RichTextPayload) + Send + 'static) {
        self.dispatcher.on_popup_hotkey(consumer);
    }

    /// Register the consumer for custom action indices (1-based)
    pub fn on_custom_action_hotkey(&self, consumer: impl FnMut(usize) + Send + 'static) {
        self.dispatcher.on_custom_action_hotkey(consumer);
    }

    pub fn set_custom_actions_enabled(&self, enabled: bool) {
        self.recognizer.set_custom_actions_enabled(enabled);
    }

    /// Host notification that its application became (in)active
    pub fn set_app_active(&self, active: bool) {
        let value = if active {
            ACTIVITY_ACTIVE
        } else {
            ACTIVITY_INACTIVE
        };
        self.activity.reported.store(value, Ordering::SeqCst);
        debug!(active, "app activity reported");
    }

    pub fn popup_shortcut(&self) -> KeyboardShortcut {
        self.lock_binding().shortcut
    }

    pub fn press_mode(&self) -> PressMode {
        self.lock_binding().press_mode
    }

    /// Rebind the popup hotkey. A rejected shortcut leaves everything as is.
    pub fn set_popup_shortcut(&self, shortcut: KeyboardShortcut) -> Result<(), ValidationError> {
        let mut binding = self.lock_binding();
        validate(&shortcut, binding.press_mode)?;
        binding.shortcut = shortcut;
        self.apply(&binding);
        Ok(())
    }

    /// Change the press mode, revalidating the current shortcut under it
    pub fn set_press_mode(&self, mode: PressMode) -> Result<(), ValidationError> {
        let mut binding = self.lock_binding();
        validate(&binding.shortcut, mode)?;
        binding.press_mode = mode;
        self.apply(&binding);
        Ok(())
    }

    /// Start the pipeline and install the keyboard tap
    pub fn start(&self) {
        self.spawn_pipeline();
        self.interceptor.start();
    }

    /// Remove the keyboard tap. Gestures already queued still complete.
    pub fn stop(&self) {
        self.interceptor.stop();
    }

    pub fn interceptor_state(&self) -> InterceptorState {
        self.interceptor.state()
    }

    fn apply(&self, binding: &HotkeySettings) {
        self.recognizer
            .set_binding(binding.shortcut, binding.press_mode);
        if let Err(e) = self.config.save_settings(binding) {
            warn!(?e, "failed to persist hotkey settings");
        }
    }

    fn spawn_pipeline(&self) {
        let mut pipeline = lock(&self.pipeline);
        if pipeline.is_some() {
            return;
        }
        let Some(rx) = lock(&self.gesture_rx).take() else {
            return;
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime available, gestures will not be processed");
                *lock(&self.gesture_rx) = Some(rx);
                return;
            }
        };

        *pipeline = Some(handle.spawn(run_pipeline(
            rx,
            self.extractor.clone(),
            self.dispatcher.clone(),
        )));
        debug!("gesture pipeline started");
    }

    fn lock_binding(&self) -> MutexGuard<'_, HotkeySettings> {
        lock(&self.binding)
    }
}

impl Drop for HotkeyService {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.pipeline).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Persisted binding, or the default if it no longer validates
fn startup_binding(settings: HotkeySettings) -> HotkeySettings {
    match validate(&settings.shortcut, settings.press_mode) {
        Ok(()) => {
            info!(
                shortcut = %settings.shortcut,
                mode = %settings.press_mode,
                "popup hotkey configured"
            );
            settings
        }
        Err(e) => {
            warn!(
                shortcut = %settings.shortcut,
                mode = %settings.press_mode,
                reason = %e,
                "persisted popup hotkey rejected, using default"
            );
            HotkeySettings::default()
        }
    }
}

/// Processes gestures one at a time, in the order the tap saw them
async fn run_pipeline(
    mut rx: mpsc::Receiver<Gesture>,
    extractor: SelectionExtractor,
    dispatcher: Dispatcher,
) {
    while let Some(gesture) = rx.recv().await {
        debug!(%gesture, "processing gesture");
        match gesture {
            Gesture::Popup => match extractor.extract().await {
                Some(payload) => dispatcher.deliver(payload),
                None => debug!("popup hotkey without a selection"),
            },
            Gesture::CustomAction { index } => dispatcher.deliver_custom_action(index),
        }
    }
    debug!("gesture pipeline finished");
}
