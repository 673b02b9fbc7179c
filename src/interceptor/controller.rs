//! Event interceptor lifecycle
//!
//! Owns the tap backend and drives it through creation, retry with backoff,
//! re-enable after OS disablement, and teardown.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{TapBackend, TapCallback};
use super::event::{Disposition, TapEvent};
use crate::gesture::GestureRecognizer;

/// Lifecycle of the keyboard tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorState {
    /// Never started
    Uninitialized,
    /// Tap installed and delivering events
    Active,
    /// Stopped, or gave up after exhausting retries
    Disabled,
    /// Waiting to create or re-enable the tap
    Retrying,
}

impl std::fmt::Display for InterceptorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptorState::Uninitialized => write!(f, "Uninitialized"),
            InterceptorState::Active => write!(f, "Active"),
            InterceptorState::Disabled => write!(f, "Disabled"),
            InterceptorState::Retrying => write!(f, "Retrying"),
        }
    }
}

/// Backoff for tap creation retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based retry attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

struct Inner {
    backend: Arc<dyn TapBackend>,
    recognizer: Arc<GestureRecognizer>,
    state: Mutex<InterceptorState>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, InterceptorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs on the tap thread for every event
    fn handle(&self, event: TapEvent) -> Disposition {
        match event {
            TapEvent::Key(key) => self.recognizer.handle_key(&key),
            TapEvent::DisabledByTimeout => {
                self.reenable("timeout");
                Disposition::Pass
            }
            TapEvent::DisabledByUserInput => {
                self.reenable("user input");
                Disposition::Pass
            }
        }
    }

    fn reenable(&self, reason: &str) {
        {
            let mut state = self.lock_state();
            if *state != InterceptorState::Active {
                debug!(%reason, state = %*state, "tap disabled while not active, ignoring");
                return;
            }
            *state = InterceptorState::Retrying;
        }

        warn!(%reason, "event tap disabled by the OS, re-enabling");
        self.backend.set_enabled(true);

        let mut state = self.lock_state();
        if *state == InterceptorState::Retrying {
            *state = InterceptorState::Active;
        }
    }
}

fn install(inner: &Arc<Inner>) -> Result<(), super::TapError> {
    let weak = Arc::downgrade(inner);
    let callback: TapCallback = Arc::new(move |event| match weak.upgrade() {
        Some(inner) => inner.handle(event),
        None => Disposition::Pass,
    });
    inner.backend.install(callback)
}

/// Sole owner of the global keyboard tap
pub struct EventInterceptor {
    inner: Arc<Inner>,
    policy: RetryPolicy,
}

impl EventInterceptor {
    /// Create an interceptor; nothing is installed until `start`
    pub fn new(
        backend: Arc<dyn TapBackend>,
        recognizer: Arc<GestureRecognizer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                recognizer,
                state: Mutex::new(InterceptorState::Uninitialized),
                retry_task: Mutex::new(None),
            }),
            policy,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> InterceptorState {
        *self.inner.lock_state()
    }

    /// Install the tap, retrying in the background on failure.
    ///
    /// Never fails: a tap that cannot be created after the retry budget
    /// leaves the interceptor `Disabled`, and `start` may be called again
    /// once the user has granted permission.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if matches!(
            *state,
            InterceptorState::Active | InterceptorState::Retrying
        ) {
            debug!(state = %*state, "interceptor already started");
            return;
        }

        match install(&self.inner) {
            Ok(()) => {
                *state = InterceptorState::Active;
                info!("event tap installed");
            }
            Err(e) => {
                warn!(%e, "event tap creation failed, will retry");
                *state = InterceptorState::Retrying;
                drop(state);
                self.spawn_retry();
            }
        }
    }

    /// Tear down the tap and cancel any pending retry
    pub fn stop(&self) {
        if let Some(task) = self
            .inner
            .retry_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }

        {
            let mut state = self.inner.lock_state();
            if matches!(
                *state,
                InterceptorState::Uninitialized | InterceptorState::Disabled
            ) {
                return;
            }
            *state = InterceptorState::Disabled;
        }

        // Outside the state lock: uninstall waits for the tap thread
        self.inner.backend.uninstall();
        info!("event tap stopped");
    }

    fn spawn_retry(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime available, event tap will not be retried");
                *self.inner.lock_state() = InterceptorState::Disabled;
                return;
            }
        };

        let task = handle.spawn(retry_install(Arc::downgrade(&self.inner), self.policy));
        *self
            .inner
            .retry_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);
    }
}

impl Drop for EventInterceptor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn retry_install(inner: Weak<Inner>, policy: RetryPolicy) {
    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting to retry event tap");
        tokio::time::sleep(delay).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut state = inner.lock_state();
        if *state != InterceptorState::Retrying {
            return;
        }
        match install(&inner) {
            Ok(()) => {
                *state = InterceptorState::Active;
                info!(attempt, "event tap installed after retry");
                return;
            }
            Err(e) => debug!(attempt, %e, "event tap retry failed"),
        }
    }

    if let Some(inner) = inner.upgrade() {
        let mut state = inner.lock_state();
        if *state == InterceptorState::Retrying {
            *state = InterceptorState::Disabled;
            warn!(
                attempts = policy.max_attempts,
                "giving up on event tap; hotkeys stay off until started again"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{ActivityFlag, Gesture, GestureTiming, SyntheticCopyFlag};
    use crate::interceptor::{KeyEvent, TapError};
    use crate::shortcut::{keycode, KeyboardShortcut, PressMode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Tap that fails a scripted number of times, then records everything
    #[derive(Default)]
    struct ScriptedTap {
        failures: AtomicUsize,
        installs: AtomicUsize,
        uninstalls: AtomicUsize,
        enables: Mutex<Vec<bool>>,
        callback: Mutex<Option<TapCallback>>,
    }

    impl ScriptedTap {
        fn failing(times: usize) -> Arc<Self> {
            let tap = Self::default();
            tap.failures.store(times, Ordering::SeqCst);
            Arc::new(tap)
        }

        fn fire(&self, event: TapEvent) -> Disposition {
            let callback = self.callback.lock().unwrap().clone();
            match callback {
                Some(callback) => callback(event),
                None => Disposition::Pass,
            }
        }
    }

    impl TapBackend for ScriptedTap {
        fn install(&self, callback: TapCallback) -> Result<(), TapError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(TapError::Creation);
            }
            *self.callback.lock().unwrap() = Some(callback);
            Ok(())
        }

        fn set_enabled(&self, enabled: bool) {
            self.enables.lock().unwrap().push(enabled);
        }

        fn uninstall(&self) {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
            self.callback.lock().unwrap().take();
        }
    }

    fn create_interceptor(
        tap: Arc<ScriptedTap>,
        policy: RetryPolicy,
    ) -> (EventInterceptor, mpsc::Receiver<Gesture>) {
        let (tx, rx) = mpsc::channel(16);
        let recognizer = Arc::new(GestureRecognizer::new(
            KeyboardShortcut::command(0x0E),
            PressMode::SinglePress,
            GestureTiming::default(),
            Arc::new(ActivityFlag::new(true)),
            SyntheticCopyFlag::new(),
            tx,
        ));
        (EventInterceptor::new(tap, recognizer, policy), rx)
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_attempts,
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = quick_policy(8);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(7), Duration::from_secs(4));
        assert_eq!(policy.delay_for(100), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_start_installs_and_routes_events() {
        let tap = Arc::new(ScriptedTap::default());
        let (interceptor, mut rx) = create_interceptor(tap.clone(), quick_policy(3));
        assert_eq!(interceptor.state(), InterceptorState::Uninitialized);

        interceptor.start();
        assert_eq!(interceptor.state(), InterceptorState::Active);

        let hotkey = KeyEvent::down(KeyboardShortcut::command(0x0E));
        let other = KeyEvent::down(KeyboardShortcut::command(keycode::V));
        assert_eq!(tap.fire(TapEvent::Key(hotkey)), Disposition::Swallow);
        assert_eq!(tap.fire(TapEvent::Key(other)), Disposition::Pass);
        assert_eq!(rx.try_recv().unwrap(), Gesture::Popup);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_twice_installs_once() {
        let tap = Arc::new(ScriptedTap::default());
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(3));
        interceptor.start();
        interceptor.start();
        assert_eq!(tap.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runtime_disable_reenables_immediately() {
        let tap = Arc::new(ScriptedTap::default());
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(3));
        interceptor.start();

        assert_eq!(tap.fire(TapEvent::DisabledByTimeout), Disposition::Pass);
        assert_eq!(tap.fire(TapEvent::DisabledByUserInput), Disposition::Pass);

        assert_eq!(*tap.enables.lock().unwrap(), vec![true, true]);
        assert_eq!(tap.installs.load(Ordering::SeqCst), 1);
        assert_eq!(interceptor.state(), InterceptorState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_created() {
        let tap = ScriptedTap::failing(2);
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(5));

        interceptor.start();
        assert_eq!(interceptor.state(), InterceptorState::Retrying);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(interceptor.state(), InterceptorState::Active);
        assert_eq!(tap.installs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_silently() {
        let tap = ScriptedTap::failing(usize::MAX);
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(3));

        interceptor.start();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(interceptor.state(), InterceptorState::Disabled);
        assert_eq!(tap.installs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_again_after_giving_up() {
        let tap = ScriptedTap::failing(2);
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(1));

        interceptor.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(interceptor.state(), InterceptorState::Disabled);

        // Permission granted in the meantime
        interceptor.start();
        assert_eq!(interceptor.state(), InterceptorState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_retry() {
        let tap = ScriptedTap::failing(usize::MAX);
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(5));

        interceptor.start();
        interceptor.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(interceptor.state(), InterceptorState::Disabled);
        assert_eq!(tap.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_uninstalls() {
        let tap = Arc::new(ScriptedTap::default());
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(3));
        interceptor.start();
        interceptor.stop();

        assert_eq!(interceptor.state(), InterceptorState::Disabled);
        assert_eq!(tap.uninstalls.load(Ordering::SeqCst), 1);
        let hotkey = KeyEvent::down(KeyboardShortcut::command(0x0E));
        assert_eq!(tap.fire(TapEvent::Key(hotkey)), Disposition::Pass);
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let tap = Arc::new(ScriptedTap::default());
        let (interceptor, _rx) = create_interceptor(tap.clone(), quick_policy(3));
        interceptor.stop();
        assert_eq!(interceptor.state(), InterceptorState::Uninitialized);
        assert_eq!(tap.uninstalls.load(Ordering::SeqCst), 0);
    }
}
