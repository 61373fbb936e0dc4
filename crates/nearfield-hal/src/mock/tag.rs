//! Mock tag endpoint.

use crate::error::{HardwareError, Result};
use crate::traits::TagEndpoint;
use nearfield_core::{NdefMessage, TagHandle, TagUid, TechMask};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct TagState {
    handle: TagHandle,
    uid: TagUid,
    technologies: TechMask,
    connected: TechMask,
    ndef: Mutex<Option<NdefMessage>>,
    // Remaining scripted failures, consumed one per call.
    read_failures: AtomicU32,
    reconnect_failures: AtomicU32,
    present: AtomicBool,
    disconnected: AtomicBool,
    read_attempts: AtomicU32,
}

/// Mock tag session with scriptable content and failure injection.
///
/// Clones share state, so a clone held by a presence watcher observes a
/// `set_present(false)` on the original.
///
/// # Examples
///
/// ```
/// use nearfield_hal::mock::MockTagEndpoint;
/// use nearfield_hal::traits::TagEndpoint;
/// use nearfield_core::{NdefMessage, TagHandle, TagUid};
///
/// # #[tokio::main]
/// # async fn main() -> nearfield_hal::Result<()> {
/// let tag = MockTagEndpoint::new(
///     TagHandle::new(1),
///     TagUid::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap(),
/// )
/// .with_ndef(NdefMessage::new(&b"https://example.com"[..]));
///
/// assert!(tag.read_ndef().await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockTagEndpoint {
    state: Arc<TagState>,
}

impl MockTagEndpoint {
    /// Create a present, NFC-A tag with no NDEF content.
    #[must_use]
    pub fn new(handle: TagHandle, uid: TagUid) -> Self {
        MockTagEndpoint {
            state: Arc::new(TagState {
                handle,
                uid,
                technologies: TechMask::NFC_A,
                connected: TechMask::NFC_A,
                ndef: Mutex::new(None),
                read_failures: AtomicU32::new(0),
                reconnect_failures: AtomicU32::new(0),
                present: AtomicBool::new(true),
                disconnected: AtomicBool::new(false),
                read_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Set the NDEF message the tag carries.
    #[must_use]
    pub fn with_ndef(self, message: NdefMessage) -> Self {
        *self.state.ndef.lock().unwrap() = Some(message);
        self
    }

    /// Set the advertised technology list.
    #[must_use]
    pub fn with_technologies(self, technologies: TechMask) -> Self {
        // Builder runs before any clone exists, so the Arc is unique.
        let mut state = self.into_unique_state();
        state.technologies = technologies;
        MockTagEndpoint {
            state: Arc::new(state),
        }
    }

    /// Set the technology the controller connected through.
    #[must_use]
    pub fn with_connected_technology(self, technology: TechMask) -> Self {
        let mut state = self.into_unique_state();
        state.connected = technology;
        MockTagEndpoint {
            state: Arc::new(state),
        }
    }

    /// Make the next `count` NDEF reads fail.
    #[must_use]
    pub fn failing_reads(self, count: u32) -> Self {
        self.state.read_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Make the next `count` reconnect attempts fail.
    #[must_use]
    pub fn failing_reconnects(self, count: u32) -> Self {
        self.state.reconnect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Simulate the tag entering or leaving the field.
    pub fn set_present(&self, present: bool) {
        self.state.present.store(present, Ordering::SeqCst);
    }

    /// Whether `disconnect` was called on this session.
    #[must_use]
    pub fn was_disconnected(&self) -> bool {
        self.state.disconnected.load(Ordering::SeqCst)
    }

    /// Number of NDEF read attempts made so far.
    #[must_use]
    pub fn read_attempts(&self) -> u32 {
        self.state.read_attempts.load(Ordering::SeqCst)
    }

    fn into_unique_state(self) -> TagState {
        Arc::try_unwrap(self.state)
            .unwrap_or_else(|_| panic!("builder methods must run before cloning"))
    }
}

impl TagEndpoint for MockTagEndpoint {
    fn handle(&self) -> TagHandle {
        self.state.handle
    }

    fn uid(&self) -> TagUid {
        self.state.uid.clone()
    }

    fn technologies(&self) -> TechMask {
        self.state.technologies
    }

    fn connected_technology(&self) -> TechMask {
        self.state.connected
    }

    async fn read_ndef(&self) -> Result<Option<NdefMessage>> {
        self.state.read_attempts.fetch_add(1, Ordering::SeqCst);
        if consume_failure(&self.state.read_failures) {
            return Err(HardwareError::tag_io("scripted NDEF read failure"));
        }
        Ok(self.state.ndef.lock().unwrap().clone())
    }

    async fn reconnect(&self) -> Result<()> {
        if consume_failure(&self.state.reconnect_failures) {
            return Err(HardwareError::TagLost);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.disconnected.store(true, Ordering::SeqCst);
        self.state.present.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_present(&self) -> bool {
        self.state.present.load(Ordering::SeqCst)
            && !self.state.disconnected.load(Ordering::SeqCst)
    }
}

fn consume_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
