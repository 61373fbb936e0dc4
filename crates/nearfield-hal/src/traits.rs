//! Controller and tag trait definitions.
//!
//! [`DeviceHost`] is the control plane of the radio controller: blocking
//! lifecycle calls (`initialize`, `deinitialize`), discovery configuration,
//! and card-emulation routing. [`TagEndpoint`] is the per-tag data plane
//! handed out through [`HostEvent::TagDiscovered`](crate::HostEvent).
//!
//! Both traits use native `async fn` (Edition 2024 RPITIT) and take
//! `&self`; implementations use interior mutability where they need state.
//! They are not object-safe, so heterogeneous storage goes through the
//! enum wrappers in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::Result;
use bytes::Bytes;
use nearfield_core::{DiscoveryParameters, NdefMessage, TagHandle, TagUid, TechMask};

/// Control plane of the NFC radio controller.
///
/// `initialize`, `deinitialize` and `commit_routing` may block for a long
/// time (firmware download, stuck controller); callers are expected to arm
/// a watchdog around them and force [`abort`](DeviceHost::abort) from a
/// separate task if the deadline passes. The remaining calls complete
/// quickly.
///
/// Implementations are constructed with the sending half of the host event
/// channel (see [`host_event_channel`](crate::host_event_channel)) and
/// report all asynchronous activity through it.
pub trait DeviceHost {
    /// Power up and initialize the controller.
    ///
    /// Returns `Ok(false)` if the controller reported an orderly
    /// initialization failure; `Err` only for transport-level faults.
    async fn initialize(&self) -> Result<bool>;

    /// Power down the controller.
    ///
    /// Returns whether the controller acknowledged the shutdown. Known to
    /// hang on wedged controllers; always watchdog-guarded by callers.
    async fn deinitialize(&self) -> Result<bool>;

    /// Configure and start the discovery (polling/listening) loop.
    ///
    /// `restart` indicates the loop is already running and must be
    /// restarted with the new configuration rather than started cold.
    async fn enable_discovery(
        &self,
        params: &DiscoveryParameters,
        restart: bool,
    ) -> Result<()>;

    /// Stop the discovery loop.
    async fn disable_discovery(&self) -> Result<()>;

    /// Commit the staged card-emulation routing table to the controller.
    async fn commit_routing(&self) -> Result<()>;

    /// Stage an AID route in the card-emulation routing table.
    async fn route_aid(&self, aid: Bytes, route: u32, aid_info: u32) -> Result<()>;

    /// Remove a staged AID route.
    async fn unroute_aid(&self, aid: Bytes) -> Result<()>;

    /// Forcibly abort whatever the controller is doing and reset the link.
    ///
    /// This is the watchdog's hammer. It must be callable while another
    /// task is blocked inside a controller call, and it cannot fail in any
    /// way the caller could act on.
    async fn abort(&self, reason: &str);

    /// Erase controller persistent state. Used once, on first boot.
    async fn factory_reset(&self) -> Result<()>;

    /// Verify (and if needed download) controller firmware without
    /// powering up the stack.
    async fn check_firmware(&self) -> Result<()>;
}

/// A tag currently, or recently, in the RF field.
///
/// Endpoints are cheap to clone; clones refer to the same underlying tag
/// session, so a presence watcher can hold one while the service keeps
/// another in its handle table.
pub trait TagEndpoint {
    /// Controller-assigned handle for this tag session.
    fn handle(&self) -> TagHandle;

    /// Tag UID.
    fn uid(&self) -> TagUid;

    /// All technologies the tag advertises.
    fn technologies(&self) -> TechMask;

    /// The single technology the controller is currently connected
    /// through.
    fn connected_technology(&self) -> TechMask;

    /// Probe for and read an NDEF message.
    ///
    /// `Ok(None)` means the tag carries no NDEF data, which is not an
    /// error; `Err` means the read itself failed and a reconnect may be
    /// worth attempting.
    async fn read_ndef(&self) -> Result<Option<NdefMessage>>;

    /// Re-establish the connection after a failed transaction.
    async fn reconnect(&self) -> Result<()>;

    /// Drop the connection. The controller resumes its polling loop.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the tag is still physically in the field.
    async fn is_present(&self) -> bool;
}
