//! Asynchronous events reported by the controller.
//!
//! The controller pushes everything it observes into one mpsc channel in
//! arrival order; the service funnels the receiving half into its event
//! loop. One channel per host instance, created by the embedder and handed
//! to the host at construction time.
//!
//! ```text
//! ┌────────────┐   HostEvent    ┌──────────────┐
//! │ DeviceHost │───────────────►│ Event Loop   │
//! │ (radio)    │   (mpsc)       │ (service)    │
//! └────────────┘                └──────────────┘
//! ```

use crate::devices::AnyTagEndpoint;
use bytes::Bytes;
use nearfield_core::{TagHandle, TechMask, constants::HOST_EVENT_QUEUE_DEPTH};
use tokio::sync::mpsc;

/// Sending half of the host event channel, held by the controller.
pub type HostEventSender = mpsc::Sender<HostEvent>;

/// Receiving half of the host event channel, held by the service.
pub type HostEventReceiver = mpsc::Receiver<HostEvent>;

/// Create the host event channel with the standard depth.
#[must_use]
pub fn host_event_channel() -> (HostEventSender, HostEventReceiver) {
    mpsc::channel(HOST_EVENT_QUEUE_DEPTH)
}

/// An asynchronous notification from the controller.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HostEvent {
    /// A tag entered the field and was activated.
    TagDiscovered(AnyTagEndpoint),

    /// A peer-to-peer link partner was activated.
    PeerActivated {
        /// Controller handle for the peer session.
        handle: TagHandle,
        /// Whether the local side is the initiator of the link.
        initiator: bool,
    },

    /// A peer-to-peer link partner was deactivated.
    PeerDeactivated {
        /// Controller handle for the peer session.
        handle: TagHandle,
    },

    /// First packet received over an activated peer-to-peer link.
    PeerFirstPacket {
        /// Controller handle for the peer session.
        handle: TagHandle,
    },

    /// An external RF field was detected.
    FieldActivated,

    /// The external RF field went away.
    FieldDeactivated,

    /// A remote reader selected the host card-emulation route.
    HceActivated {
        /// Technology the reader is using.
        technology: TechMask,
    },

    /// Command data received within a host card-emulation session.
    HceData {
        /// Technology the reader is using.
        technology: TechMask,
        /// Raw command payload from the remote reader.
        data: Bytes,
    },

    /// The host card-emulation session ended.
    HceDeactivated {
        /// Technology the reader was using.
        technology: TechMask,
    },

    /// A transaction was routed to an off-host secure element.
    Transaction {
        /// Application identifier selected by the reader.
        aid: Bytes,
        /// Transaction payload, if the controller captured one.
        data: Bytes,
        /// Name of the secure element that handled the transaction.
        origin: String,
    },
}
