//! Collaborator seams of the service.
//!
//! The service core stays ignorant of how tags reach applications, how
//! feedback is rendered, and how the platform keeps the CPU awake; those
//! concerns arrive through the traits below. All of them are object-safe
//! and synchronous: implementations are expected to return quickly and
//! push any heavy work onto their own tasks, because they are invoked from
//! the service event loop.

use nearfield_core::{NdefMessage, TagHandle, TagUid, TechMask};
use tracing::debug;

/// A tag as delivered to consumers: the stable facts about the session,
/// with the tag's NDEF message if one was read.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedTag {
    /// Controller handle for the tag session.
    pub handle: TagHandle,

    /// Tag UID.
    pub uid: TagUid,

    /// Technologies the tag advertises.
    pub technologies: TechMask,

    /// NDEF message read during discovery, if any.
    pub ndef: Option<NdefMessage>,
}

/// Outcome of a foreground dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// An application consumed the tag.
    Delivered,

    /// No application wanted the tag.
    Rejected,
}

/// Foreground dispatch collaborator: routes a discovered tag to whatever
/// application should handle it.
pub trait TagDispatcher: Send + Sync {
    /// Dispatch a tag. Must not block.
    fn dispatch(&self, tag: DispatchedTag) -> DispatchStatus;
}

/// Dispatcher used when the embedder does not install one. Rejects every
/// tag, which surfaces as the error feedback cue.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl TagDispatcher for NullDispatcher {
    fn dispatch(&self, tag: DispatchedTag) -> DispatchStatus {
        debug!(uid = %tag.uid, "no dispatcher installed, rejecting tag");
        DispatchStatus::Rejected
    }
}

/// User-perceptible feedback cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCue {
    /// Tag handled successfully.
    Confirm,

    /// Tag could not be dispatched.
    Error,
}

/// Sound/vibration feedback collaborator.
///
/// `prepare` and `release` bracket the adapter's On window, mirroring how
/// audio resources are loaded only while the controller can actually
/// produce events.
pub trait FeedbackSink: Send + Sync {
    /// Load feedback resources. Called when the adapter turns on.
    fn prepare(&self);

    /// Release feedback resources. Called when the adapter turns off.
    fn release(&self);

    /// Play a cue. Silently ignored while resources are not prepared.
    fn play(&self, cue: FeedbackCue);
}

/// Feedback sink that does nothing.
#[derive(Debug, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn prepare(&self) {}

    fn release(&self) {}

    fn play(&self, _cue: FeedbackCue) {}
}

/// Platform wake-lock collaborator, held across controller initialization
/// so the device cannot sleep mid firmware download.
pub trait WakeLock: Send + Sync {
    /// Take the wake lock.
    fn acquire(&self);

    /// Drop the wake lock.
    fn release(&self);
}

/// Wake lock that does nothing. Suitable for platforms where the process
/// cannot be suspended.
#[derive(Debug, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self) {}

    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_dispatcher_rejects() {
        let dispatcher = NullDispatcher;
        let tag = DispatchedTag {
            handle: TagHandle::new(1),
            uid: TagUid::new(vec![0x01]).unwrap(),
            technologies: TechMask::NFC_A,
            ndef: None,
        };
        assert_eq!(dispatcher.dispatch(tag), DispatchStatus::Rejected);
    }
}
