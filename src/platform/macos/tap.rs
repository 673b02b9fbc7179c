//! Global keyboard tap using macOS CGEventTap
//!
//! The tap is an active filter at the head of the session event stream so
//! matched shortcuts can be swallowed. It runs on a dedicated thread with its
//! own CFRunLoop.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPort;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_foundation_sys::mach_port::CFMachPortRef;
use tracing::{debug, error, info};

use crate::interceptor::{Disposition, KeyEvent, KeyKind, TapBackend, TapCallback, TapError, TapEvent};

type CGEventRef = *mut c_void;
type CGEventTapProxy = *mut c_void;

type CGEventTapCallBack = extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

const K_CG_SESSION_EVENT_TAP: u32 = 1;
const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const K_CG_EVENT_TAP_OPTION_DEFAULT: u32 = 0;

const K_CG_EVENT_KEY_DOWN: u32 = 10;
const K_CG_EVENT_KEY_UP: u32 = 11;
const K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const K_CG_KEYBOARD_EVENT_AUTOREPEAT: u32 = 8;
const K_CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
    fn CGEventGetFlags(event: CGEventRef) -> u64;
}

/// How long the run loop blocks before checking for shutdown
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// CGEventTap-backed keyboard tap
pub struct MacTap {
    running: Arc<AtomicBool>,
    port: Arc<AtomicPtr<c_void>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MacTap {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            port: Arc::new(AtomicPtr::new(ptr::null_mut())),
            thread: Mutex::new(None),
        }
    }

    fn lock_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MacTap {
    fn default() -> Self {
        Self::new()
    }
}

impl TapBackend for MacTap {
    fn install(&self, callback: TapCallback) -> Result<(), TapError> {
        let mut thread = self.lock_thread();
        if thread.is_some() {
            return Err(TapError::AlreadyInstalled);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let port = Arc::clone(&self.port);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || {
                debug!("event tap thread started");
                run_tap(callback, running, port, ready_tx);
                debug!("event tap thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                TapError::ThreadSpawn(e.to_string())
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *thread = Some(handle);
                info!("event tap created and enabled");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(TapError::Creation)
            }
        }
    }

    fn set_enabled(&self, enabled: bool) {
        let port = self.port.load(Ordering::SeqCst);
        if port.is_null() {
            return;
        }
        // SAFETY: the port stays valid until the tap thread clears it
        unsafe { CGEventTapEnable(port as CFMachPortRef, enabled) };
        debug!(enabled, "event tap enable toggled");
    }

    fn uninstall(&self) {
        let Some(handle) = self.lock_thread().take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("event tap thread panicked");
        }
    }
}

impl Drop for MacTap {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Create the tap, report the outcome, then pump the run loop until stopped
fn run_tap(
    callback: TapCallback,
    running: Arc<AtomicBool>,
    port: Arc<AtomicPtr<c_void>>,
    ready: mpsc::Sender<Result<(), TapError>>,
) {
    let event_mask: u64 = (1 << K_CG_EVENT_KEY_DOWN) | (1 << K_CG_EVENT_KEY_UP);
    let context = Box::into_raw(Box::new(callback));

    // SAFETY: the context outlives the tap; both are released below
    let raw = unsafe {
        CGEventTapCreate(
            K_CG_SESSION_EVENT_TAP,
            K_CG_HEAD_INSERT_EVENT_TAP,
            K_CG_EVENT_TAP_OPTION_DEFAULT,
            event_mask,
            tap_callback,
            context as *mut c_void,
        )
    };

    if raw.is_null() {
        error!("failed to create event tap - is Accessibility permission granted?");
        // SAFETY: no tap holds the context
        drop(unsafe { Box::from_raw(context) });
        let _ = ready.send(Err(TapError::Creation));
        return;
    }

    // SAFETY: CGEventTapCreate follows the create rule
    let mach_port = unsafe { CFMachPort::wrap_under_create_rule(raw) };
    let source = match mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            drop(mach_port);
            // SAFETY: the tap is released
            drop(unsafe { Box::from_raw(context) });
            let _ = ready.send(Err(TapError::RunLoopSource));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), true);
    }
    port.store(mach_port.as_concrete_TypeRef() as *mut c_void, Ordering::SeqCst);
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }
    }

    port.store(ptr::null_mut(), Ordering::SeqCst);
    unsafe {
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), false);
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
    drop(source);
    drop(mach_port);
    // SAFETY: the tap is disabled and released, no callback can run
    drop(unsafe { Box::from_raw(context) });
}

extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    // SAFETY: user_info is the boxed callback owned by run_tap
    let callback = unsafe { &*(user_info as *const TapCallback) };

    let tap_event = match event_type {
        K_CG_EVENT_KEY_DOWN => TapEvent::Key(key_event(event, KeyKind::Down)),
        K_CG_EVENT_KEY_UP => TapEvent::Key(key_event(event, KeyKind::Up)),
        K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT => TapEvent::DisabledByTimeout,
        K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT => TapEvent::DisabledByUserInput,
        _ => return event,
    };

    // Unwinding into CoreGraphics aborts the process
    let disposition =
        catch_unwind(AssertUnwindSafe(|| callback(tap_event))).unwrap_or(Disposition::Pass);

    match disposition {
        Disposition::Pass => event,
        Disposition::Swallow => ptr::null_mut(),
    }
}

fn key_event(event: CGEventRef, kind: KeyKind) -> KeyEvent {
    // SAFETY: event is a live keyboard event for the duration of the callback
    let (key_code, repeat, flags) = unsafe {
        (
            CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_KEYCODE),
            CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_AUTOREPEAT),
            CGEventGetFlags(event),
        )
    };
    KeyEvent::from_raw(key_code as u16, flags, kind, repeat != 0)
}
