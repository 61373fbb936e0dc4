//! Reader-mode registrations.
//!
//! A reader-mode caller takes exclusive control of polling: the controller
//! polls only the requested technologies and discovered tags bypass the
//! foreground dispatch path, flowing instead through the registration's
//! channel. The channel doubles as the owner-liveness monitor: when the
//! caller drops its [`ReaderModeSession`] (or its process dies and the
//! session with it), the sender's `closed()` future resolves and the
//! event loop revokes the registration, exactly as if the caller had
//! cleared it.

use crate::traits::DispatchedTag;
use nearfield_core::ReaderModeFlags;
use nearfield_core::constants::DEFAULT_PRESENCE_CHECK_DELAY_MS;
use std::time::Duration;
use tokio::sync::mpsc;

/// Depth of a reader-mode tag channel. Tags arriving while the consumer
/// lags beyond this are dropped with a warning.
pub(crate) const READER_CHANNEL_DEPTH: usize = 8;

/// Optional settings for a reader-mode registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderModeOptions {
    /// Interval between tag presence checks while this registration is
    /// active.
    pub presence_check_delay: Duration,
}

impl Default for ReaderModeOptions {
    fn default() -> Self {
        ReaderModeOptions {
            presence_check_delay: Duration::from_millis(DEFAULT_PRESENCE_CHECK_DELAY_MS),
        }
    }
}

/// The active registration as the event loop sees it.
#[derive(Debug, Clone)]
pub(crate) struct ActiveReaderMode {
    pub(crate) flags: ReaderModeFlags,
    pub(crate) presence_check_delay: Duration,
    pub(crate) tags: mpsc::Sender<DispatchedTag>,
    /// Monotonic registration counter. A liveness notification carrying a
    /// stale generation is ignored, which makes last-writer-wins safe.
    pub(crate) generation: u64,
}

/// Caller's half of a reader-mode registration.
///
/// Receive discovered tags with [`next_tag`](ReaderModeSession::next_tag).
/// Dropping the session revokes the registration and restores the default
/// polling policy.
#[derive(Debug)]
pub struct ReaderModeSession {
    tags: mpsc::Receiver<DispatchedTag>,
}

impl ReaderModeSession {
    pub(crate) fn new(tags: mpsc::Receiver<DispatchedTag>) -> Self {
        ReaderModeSession { tags }
    }

    /// Wait for the next discovered tag.
    ///
    /// Returns `None` once the registration has been superseded by a newer
    /// one or the service has shut down.
    pub async fn next_tag(&mut self) -> Option<DispatchedTag> {
        self.tags.recv().await
    }

    /// Non-blocking variant of [`next_tag`](ReaderModeSession::next_tag).
    pub fn try_next_tag(&mut self) -> Option<DispatchedTag> {
        self.tags.try_recv().ok()
    }
}
