//! Mock NFC controller.

use crate::devices::AnyTagEndpoint;
use crate::error::Result;
use crate::events::{HostEvent, HostEventSender};
use crate::mock::MockTagEndpoint;
use crate::traits::DeviceHost;
use bytes::Bytes;
use nearfield_core::{DiscoveryParameters, TagHandle, TechMask};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// Scripted outcome for a controller lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallBehavior {
    /// Complete immediately and report success.
    #[default]
    Succeed,

    /// Complete immediately and report an orderly failure.
    Fail,

    /// Block until [`DeviceHost::abort`] is invoked, then report failure.
    ///
    /// This is how a wedged controller looks to the service: the call
    /// never returns on its own and only the watchdog's abort releases it.
    Hang,
}

/// A recorded control-plane call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Initialize,
    Deinitialize,
    EnableDiscovery {
        params: DiscoveryParameters,
        restart: bool,
    },
    DisableDiscovery,
    CommitRouting,
    RouteAid {
        aid: Bytes,
        route: u32,
        aid_info: u32,
    },
    UnrouteAid {
        aid: Bytes,
    },
    Abort {
        reason: String,
    },
    FactoryReset,
    CheckFirmware,
}

#[derive(Debug)]
struct HostState {
    calls: Mutex<Vec<HostCall>>,
    init_behavior: Mutex<CallBehavior>,
    deinit_behavior: Mutex<CallBehavior>,
    initialized: AtomicBool,
    discovery_enabled: AtomicBool,
    current_params: Mutex<Option<DiscoveryParameters>>,
    aborted: AtomicBool,
    abort_notify: Notify,
}

impl HostState {
    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Mock radio controller.
///
/// Created together with a [`MockHostController`] that scripts its behavior
/// and injects hardware events:
///
/// ```
/// use nearfield_hal::mock::MockDeviceHost;
/// use nearfield_hal::{DeviceHost, host_event_channel};
///
/// # #[tokio::main]
/// # async fn main() -> nearfield_hal::Result<()> {
/// let (events_tx, _events_rx) = host_event_channel();
/// let (host, controller) = MockDeviceHost::new(events_tx);
///
/// assert!(host.initialize().await?);
/// assert!(controller.initialized());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockDeviceHost {
    state: Arc<HostState>,
}

impl MockDeviceHost {
    /// Create a mock controller reporting events on `events`.
    pub fn new(events: HostEventSender) -> (Self, MockHostController) {
        let state = Arc::new(HostState {
            calls: Mutex::new(Vec::new()),
            init_behavior: Mutex::new(CallBehavior::Succeed),
            deinit_behavior: Mutex::new(CallBehavior::Succeed),
            initialized: AtomicBool::new(false),
            discovery_enabled: AtomicBool::new(false),
            current_params: Mutex::new(None),
            aborted: AtomicBool::new(false),
            abort_notify: Notify::new(),
        });

        let host = MockDeviceHost {
            state: Arc::clone(&state),
        };
        let controller = MockHostController { state, events };
        (host, controller)
    }

    async fn run_behavior(&self, behavior: CallBehavior) -> bool {
        match behavior {
            CallBehavior::Succeed => true,
            CallBehavior::Fail => false,
            CallBehavior::Hang => {
                self.state.abort_notify.notified().await;
                false
            }
        }
    }
}

impl DeviceHost for MockDeviceHost {
    async fn initialize(&self) -> Result<bool> {
        self.state.record(HostCall::Initialize);
        let behavior = *self.state.init_behavior.lock().unwrap();
        let ok = self.run_behavior(behavior).await;
        self.state.initialized.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn deinitialize(&self) -> Result<bool> {
        self.state.record(HostCall::Deinitialize);
        let behavior = *self.state.deinit_behavior.lock().unwrap();
        let ok = self.run_behavior(behavior).await;
        self.state.initialized.store(false, Ordering::SeqCst);
        self.state.discovery_enabled.store(false, Ordering::SeqCst);
        Ok(ok)
    }

    async fn enable_discovery(
        &self,
        params: &DiscoveryParameters,
        restart: bool,
    ) -> Result<()> {
        self.state.record(HostCall::EnableDiscovery {
            params: params.clone(),
            restart,
        });
        self.state.discovery_enabled.store(true, Ordering::SeqCst);
        *self.state.current_params.lock().unwrap() = Some(params.clone());
        Ok(())
    }

    async fn disable_discovery(&self) -> Result<()> {
        self.state.record(HostCall::DisableDiscovery);
        self.state.discovery_enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_routing(&self) -> Result<()> {
        self.state.record(HostCall::CommitRouting);
        Ok(())
    }

    async fn route_aid(&self, aid: Bytes, route: u32, aid_info: u32) -> Result<()> {
        self.state.record(HostCall::RouteAid {
            aid,
            route,
            aid_info,
        });
        Ok(())
    }

    async fn unroute_aid(&self, aid: Bytes) -> Result<()> {
        self.state.record(HostCall::UnrouteAid { aid });
        Ok(())
    }

    async fn abort(&self, reason: &str) {
        debug!(reason, "mock controller abort");
        self.state.record(HostCall::Abort {
            reason: reason.to_string(),
        });
        self.state.aborted.store(true, Ordering::SeqCst);
        self.state.initialized.store(false, Ordering::SeqCst);
        self.state.abort_notify.notify_waiters();
    }

    async fn factory_reset(&self) -> Result<()> {
        self.state.record(HostCall::FactoryReset);
        Ok(())
    }

    async fn check_firmware(&self) -> Result<()> {
        self.state.record(HostCall::CheckFirmware);
        Ok(())
    }
}

/// Scripting and inspection handle for a [`MockDeviceHost`].
///
/// The controller side of the pair: presents tags, raises field events,
/// scripts lifecycle outcomes, and exposes the recorded call log.
#[derive(Debug, Clone)]
pub struct MockHostController {
    state: Arc<HostState>,
    events: HostEventSender,
}

impl MockHostController {
    /// Script the outcome of the next `initialize` calls.
    pub fn set_init_behavior(&self, behavior: CallBehavior) {
        *self.state.init_behavior.lock().unwrap() = behavior;
    }

    /// Script the outcome of the next `deinitialize` calls.
    pub fn set_deinit_behavior(&self, behavior: CallBehavior) {
        *self.state.deinit_behavior.lock().unwrap() = behavior;
    }

    /// Present a tag to the (simulated) RF field.
    ///
    /// # Errors
    /// Fails if the service side of the event channel is gone.
    pub async fn present_tag(&self, tag: MockTagEndpoint) -> Result<()> {
        self.send(HostEvent::TagDiscovered(AnyTagEndpoint::Mock(tag)))
            .await
    }

    /// Report a peer-to-peer link activation.
    pub async fn peer_activated(&self, handle: TagHandle, initiator: bool) -> Result<()> {
        self.send(HostEvent::PeerActivated { handle, initiator }).await
    }

    /// Report a peer-to-peer link deactivation.
    pub async fn peer_deactivated(&self, handle: TagHandle) -> Result<()> {
        self.send(HostEvent::PeerDeactivated { handle }).await
    }

    /// Report the first packet on an activated peer-to-peer link.
    pub async fn peer_first_packet(&self, handle: TagHandle) -> Result<()> {
        self.send(HostEvent::PeerFirstPacket { handle }).await
    }

    /// Report an external RF field appearing.
    pub async fn field_activated(&self) -> Result<()> {
        self.send(HostEvent::FieldActivated).await
    }

    /// Report the external RF field disappearing.
    pub async fn field_deactivated(&self) -> Result<()> {
        self.send(HostEvent::FieldDeactivated).await
    }

    /// Report a host card-emulation activation.
    pub async fn hce_activated(&self, technology: TechMask) -> Result<()> {
        self.send(HostEvent::HceActivated { technology }).await
    }

    /// Report command data within a host card-emulation session.
    pub async fn hce_data(&self, technology: TechMask, data: Bytes) -> Result<()> {
        self.send(HostEvent::HceData { technology, data }).await
    }

    /// Report a host card-emulation deactivation.
    pub async fn hce_deactivated(&self, technology: TechMask) -> Result<()> {
        self.send(HostEvent::HceDeactivated { technology }).await
    }

    /// Report an off-host transaction.
    pub async fn transaction(
        &self,
        aid: Bytes,
        data: Bytes,
        origin: impl Into<String>,
    ) -> Result<()> {
        self.send(HostEvent::Transaction {
            aid,
            data,
            origin: origin.into(),
        })
        .await
    }

    /// Snapshot of every control-plane call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Whether the controller is currently initialized.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    /// Whether the discovery loop is currently running.
    #[must_use]
    pub fn discovery_enabled(&self) -> bool {
        self.state.discovery_enabled.load(Ordering::SeqCst)
    }

    /// The most recently applied discovery parameters, if any.
    #[must_use]
    pub fn current_params(&self) -> Option<DiscoveryParameters> {
        self.state.current_params.lock().unwrap().clone()
    }

    /// Whether `abort` was ever invoked.
    #[must_use]
    pub fn was_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    async fn send(&self, event: HostEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| {
            crate::HardwareError::communication("host event channel closed")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::host_event_channel;
    use nearfield_core::TagUid;

    #[tokio::test]
    async fn test_initialize_records_call() {
        let (tx, _rx) = host_event_channel();
        let (host, controller) = MockDeviceHost::new(tx);

        assert!(host.initialize().await.unwrap());
        assert!(controller.initialized());
        assert_eq!(controller.calls(), vec![HostCall::Initialize]);
    }

    #[tokio::test]
    async fn test_scripted_init_failure() {
        let (tx, _rx) = host_event_channel();
        let (host, controller) = MockDeviceHost::new(tx);

        controller.set_init_behavior(CallBehavior::Fail);
        assert!(!host.initialize().await.unwrap());
        assert!(!controller.initialized());
    }

    #[tokio::test]
    async fn test_hang_released_by_abort() {
        let (tx, _rx) = host_event_channel();
        let (host, controller) = MockDeviceHost::new(tx);
        controller.set_init_behavior(CallBehavior::Hang);

        let host2 = host.clone();
        let init = tokio::spawn(async move { host2.initialize().await });

        // Give the init call a chance to park on the notify.
        tokio::task::yield_now().await;
        host.abort("test").await;

        assert!(!init.await.unwrap().unwrap());
        assert!(controller.was_aborted());
    }

    #[tokio::test]
    async fn test_discovery_state_tracking() {
        let (tx, _rx) = host_event_channel();
        let (host, controller) = MockDeviceHost::new(tx);

        let params = DiscoveryParameters::builder()
            .tech_mask(TechMask::NFC_A)
            .build();
        host.enable_discovery(&params, false).await.unwrap();
        assert!(controller.discovery_enabled());
        assert_eq!(controller.current_params(), Some(params));

        host.disable_discovery().await.unwrap();
        assert!(!controller.discovery_enabled());
    }

    #[tokio::test]
    async fn test_present_tag_emits_event() {
        let (tx, mut rx) = host_event_channel();
        let (_host, controller) = MockDeviceHost::new(tx);

        let tag = MockTagEndpoint::new(
            TagHandle::new(3),
            TagUid::new(vec![0xAA, 0xBB]).unwrap(),
        );
        controller.present_tag(tag).await.unwrap();

        match rx.recv().await.unwrap() {
            HostEvent::TagDiscovered(tag) => {
                use crate::traits::TagEndpoint;
                assert_eq!(tag.handle(), TagHandle::new(3));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
