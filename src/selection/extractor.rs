//! Selection extraction
//!
//! Reads the selection of the focused application through accessibility
//! first. When that yields nothing, borrows the clipboard: snapshot, inject
//! a copy keystroke, wait for the target to respond, read, restore.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::payload::{payload_from_pasteboard, AttributedText, RichTextCodec, RichTextPayload};
use crate::clipboard::{Pasteboard, PasteboardSnapshot};
use crate::gesture::{SyntheticCopyFlag, SyntheticCopyGuard, SYNTHETIC_COPY_MAX};

/// Default wait between the synthetic copy and reading the clipboard.
///
/// Empirical: slow applications may need longer.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Longest accepted settle delay; the synthetic-copy flag must outlive it
pub const MAX_SETTLE_DELAY: Duration = SYNTHETIC_COPY_MAX.saturating_sub(Duration::from_millis(500));

/// Selection as reported by accessibility introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxSelection {
    Rich(AttributedText),
    Plain(String),
}

/// Accessibility introspection of the focused UI element
pub trait Accessibility: Send + Sync {
    /// Selected text of the focused element (or the focused window when no
    /// element reports focus). Rich text is preferred over plain text.
    fn selection(&self) -> Option<AxSelection>;
}

/// Errors from synthesizing input
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("failed to create event source")]
    EventSource,

    #[error("failed to create keyboard event")]
    EventCreation,
}

/// Synthesizes keyboard input into the focused application
pub trait InputInjector: Send + Sync {
    /// Post a copy key-down/key-up pair
    fn post_copy(&self) -> Result<(), InjectError>;
}

/// Pasteboard shared between the extractor and the platform
pub type SharedPasteboard = Arc<Mutex<dyn Pasteboard>>;

/// Extracts the current selection of the focused application
#[derive(Clone)]
pub struct SelectionExtractor {
    accessibility: Arc<dyn Accessibility>,
    injector: Arc<dyn InputInjector>,
    pasteboard: SharedPasteboard,
    codec: Arc<dyn RichTextCodec>,
    synthetic_copy: SyntheticCopyFlag,
    settle_delay: Duration,
}

impl SelectionExtractor {
    pub fn new(
        accessibility: Arc<dyn Accessibility>,
        injector: Arc<dyn InputInjector>,
        pasteboard: SharedPasteboard,
        codec: Arc<dyn RichTextCodec>,
        synthetic_copy: SyntheticCopyFlag,
    ) -> Self {
        Self {
            accessibility,
            injector,
            pasteboard,
            codec,
            synthetic_copy,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the settle delay, capped at `MAX_SETTLE_DELAY`
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        if settle_delay > MAX_SETTLE_DELAY {
            warn!(
                requested_ms = settle_delay.as_millis() as u64,
                max_ms = MAX_SETTLE_DELAY.as_millis() as u64,
                "settle delay capped"
            );
        }
        self.settle_delay = settle_delay.min(MAX_SETTLE_DELAY);
        self
    }

    /// Current selection, or `None` when nothing is selected
    pub async fn extract(&self) -> Option<RichTextPayload> {
        if let Some(payload) = self.extract_accessibility().await {
            info!(
                chars = payload.plain.chars().count(),
                rich = payload.is_rich(),
                "selection captured via accessibility"
            );
            return Some(payload);
        }

        let payload = self.extract_via_copy().await;
        match &payload {
            Some(payload) => info!(
                chars = payload.plain.chars().count(),
                rich = payload.is_rich(),
                "selection captured via clipboard"
            ),
            None => debug!("no selection"),
        }
        payload
    }

    async fn extract_accessibility(&self) -> Option<RichTextPayload> {
        let accessibility = Arc::clone(&self.accessibility);
        let selection = match tokio::task::spawn_blocking(move || accessibility.selection()).await
        {
            Ok(selection) => selection?,
            Err(e) => {
                warn!(?e, "accessibility query panicked");
                return None;
            }
        };

        let payload = match selection {
            AxSelection::Rich(text) => self.codec.to_payload(&text),
            AxSelection::Plain(text) => RichTextPayload::plain(text),
        };
        (!payload.is_blank()).then_some(payload)
    }

    async fn extract_via_copy(&self) -> Option<RichTextPayload> {
        let bracket = CopyBracket::open(&self.pasteboard, &self.synthetic_copy);

        if let Err(e) = self.injector.post_copy() {
            warn!(?e, "failed to synthesize copy");
            return None;
        }

        tokio::time::sleep(self.settle_delay).await;

        bracket.read(&*self.codec)
        // bracket drops here and restores the clipboard
    }
}

/// Clipboard borrowed for one synthetic copy.
///
/// Dropping it puts the captured contents back and lowers the
/// synthetic-copy flag, on every exit path.
struct CopyBracket<'a> {
    pasteboard: &'a SharedPasteboard,
    snapshot: PasteboardSnapshot,
    change_count: i64,
    _synthetic: SyntheticCopyGuard,
}

impl<'a> CopyBracket<'a> {
    fn open(pasteboard: &'a SharedPasteboard, flag: &SyntheticCopyFlag) -> Self {
        let (snapshot, change_count) = {
            let board = lock(pasteboard);
            (PasteboardSnapshot::capture(&*board), board.change_count())
        };
        Self {
            pasteboard,
            snapshot,
            change_count,
            _synthetic: flag.raise(),
        }
    }

    /// Payload of the copy, if the target application wrote one
    fn read(&self, codec: &dyn RichTextCodec) -> Option<RichTextPayload> {
        let board = lock(self.pasteboard);
        if board.change_count() == self.change_count {
            debug!("clipboard unchanged after synthetic copy");
            return None;
        }
        payload_from_pasteboard(&*board, codec)
    }
}

impl Drop for CopyBracket<'_> {
    fn drop(&mut self) {
        let mut board = lock(self.pasteboard);
        if board.change_count() == self.change_count {
            // Nothing was written, contents are still the user's
            return;
        }
        if let Err(e) = self.snapshot.restore(&mut *board) {
            warn!(?e, "failed to restore clipboard after synthetic copy");
        }
    }
}

fn lock(pasteboard: &SharedPasteboard) -> MutexGuard<'_, dyn Pasteboard + 'static> {
    pasteboard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
