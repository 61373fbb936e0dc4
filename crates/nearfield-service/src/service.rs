//! Service construction and the public handle.
//!
//! [`NfcService`] wires the pieces together: the event loop, the lifecycle
//! worker, the hardware event forwarder and the stats ticker, each on its
//! own task. Collaborators are injected explicitly; the service has no
//! global instance and the controller reaches it only through the event
//! channel it was constructed with.
//!
//! # Examples
//!
//! ```no_run
//! use nearfield_hal::mock::MockDeviceHost;
//! use nearfield_hal::{AnyDeviceHost, host_event_channel};
//! use nearfield_service::{NfcService, ServiceConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> nearfield_service::Result<()> {
//! let (events_tx, events_rx) = host_event_channel();
//! let (host, _controller) = MockDeviceHost::new(events_tx);
//!
//! let service = NfcService::new(ServiceConfig::default());
//! let handle = service.start(AnyDeviceHost::Mock(host), events_rx);
//!
//! assert!(handle.enable().await?);
//! # Ok(())
//! # }
//! ```

use crate::config::ServiceConfig;
use crate::event_loop::{EventLoop, LoopMessage, ServiceEvent};
use crate::lifecycle::{LifecycleTask, LifecycleWorker};
use crate::packages::{PackageRegistry, StaticPackageRegistry};
use crate::prefs::{MemoryPreferenceStore, PreferenceStore};
use crate::reader::{READER_CHANNEL_DEPTH, ReaderModeOptions, ReaderModeSession};
use crate::traits::{
    DispatchedTag, FeedbackSink, NoopWakeLock, NullDispatcher, NullFeedback, TagDispatcher,
    WakeLock,
};
use crate::unlock::UnlockHandlerId;
use crate::{Result, ServiceError};
use bytes::Bytes;
use chrono::Utc;
use nearfield_core::constants::LIFECYCLE_QUEUE_DEPTH;
use nearfield_core::{AdapterState, ReaderModeFlags, ScreenState, TagHandle};
use nearfield_hal::{AnyDeviceHost, HostEventReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

/// Capacity of the outward event broadcast. Slow subscribers see lagged
/// receives, never block the loop.
const EVENT_BROADCAST_DEPTH: usize = 32;

/// Service under construction.
///
/// Install collaborators, then [`start`](NfcService::start) it. Any
/// collaborator left out gets a null implementation.
pub struct NfcService {
    config: ServiceConfig,
    dispatcher: Arc<dyn TagDispatcher>,
    feedback: Arc<dyn FeedbackSink>,
    wake_lock: Arc<dyn WakeLock>,
    registry: Arc<dyn PackageRegistry>,
    prefs: Arc<dyn PreferenceStore>,
}

impl NfcService {
    /// Create a service with the given configuration and null
    /// collaborators.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        NfcService {
            config,
            dispatcher: Arc::new(NullDispatcher),
            feedback: Arc::new(NullFeedback),
            wake_lock: Arc::new(NoopWakeLock),
            registry: Arc::new(StaticPackageRegistry::default()),
            prefs: Arc::new(MemoryPreferenceStore::default()),
        }
    }

    /// Install the foreground dispatch collaborator.
    pub fn set_dispatcher(&mut self, dispatcher: impl TagDispatcher + 'static) {
        self.dispatcher = Arc::new(dispatcher);
    }

    /// Install the feedback collaborator.
    pub fn set_feedback(&mut self, feedback: impl FeedbackSink + 'static) {
        self.feedback = Arc::new(feedback);
    }

    /// Install the wake-lock collaborator.
    pub fn set_wake_lock(&mut self, wake_lock: impl WakeLock + 'static) {
        self.wake_lock = Arc::new(wake_lock);
    }

    /// Install the package registry collaborator.
    pub fn set_package_registry(&mut self, registry: impl PackageRegistry + 'static) {
        self.registry = Arc::new(registry);
    }

    /// Install the preference store.
    pub fn set_preference_store(&mut self, prefs: impl PreferenceStore + 'static) {
        self.prefs = Arc::new(prefs);
    }

    /// Spawn the service tasks and return the caller handle.
    ///
    /// The startup sequence runs immediately: first-boot work if
    /// outstanding, then the persisted on/off preference is restored.
    #[must_use]
    pub fn start(self, host: AnyDeviceHost, host_events: HostEventReceiver) -> ServiceHandle {
        info!("starting NFC service");
        let host = Arc::new(host);
        let (state_tx, state_rx) = watch::channel(AdapterState::Off);
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(LIFECYCLE_QUEUE_DEPTH);
        let (events_out, _) = broadcast::channel(EVENT_BROADCAST_DEPTH);

        // Hardware events funnel into the loop queue in arrival order.
        let forward_tx = loop_tx.clone();
        let mut host_events = host_events;
        tokio::spawn(async move {
            while let Some(event) = host_events.recv().await {
                if forward_tx.send(LoopMessage::Host(event)).is_err() {
                    break;
                }
            }
        });

        let event_loop = EventLoop::new(
            Arc::clone(&host),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.feedback),
            Arc::clone(&self.registry),
            self.config.clone(),
            state_rx.clone(),
            loop_tx.clone(),
            loop_rx,
            events_out.clone(),
        );
        tokio::spawn(event_loop.run());

        let worker = LifecycleWorker::new(
            host,
            Arc::clone(&self.prefs),
            Arc::clone(&self.wake_lock),
            self.config.clone(),
            state_tx,
            loop_tx.clone(),
            lifecycle_rx,
        );
        tokio::spawn(worker.run());

        let stats_tx = loop_tx.clone();
        let stats_interval = self.config.stats_flush_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(stats_interval);
            ticker.tick().await; // the immediate first tick
            loop {
                ticker.tick().await;
                if stats_tx.send(LoopMessage::FlushStats).is_err() {
                    break;
                }
            }
        });

        if lifecycle_tx.try_send(LifecycleTask::Boot).is_err() {
            warn!("failed to enqueue boot task");
        }

        ServiceHandle {
            config: self.config,
            prefs: self.prefs,
            lifecycle_tx,
            loop_tx,
            state_rx,
            events_out,
        }
    }
}

/// Resolves once an ignored tag has physically left the field.
#[derive(Debug)]
pub struct TagRemovalWatch {
    rx: oneshot::Receiver<()>,
}

impl TagRemovalWatch {
    /// Wait for the removal notification.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

/// Cloneable caller handle to a running service.
#[derive(Clone)]
pub struct ServiceHandle {
    config: ServiceConfig,
    prefs: Arc<dyn PreferenceStore>,
    lifecycle_tx: mpsc::Sender<LifecycleTask>,
    loop_tx: mpsc::UnboundedSender<LoopMessage>,
    state_rx: watch::Receiver<AdapterState>,
    events_out: broadcast::Sender<ServiceEvent>,
}

impl ServiceHandle {
    /// Enable the adapter and persist the preference.
    ///
    /// Returns whether the adapter ended up enabled. Queued behind any
    /// lifecycle work already submitted.
    pub async fn enable(&self) -> Result<bool> {
        self.persist_nfc_on(true);
        let (done, result) = oneshot::channel();
        self.submit(LifecycleTask::Enable { done: Some(done) })
            .await?;
        result.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Disable the adapter, persisting the preference if `persist` is
    /// set.
    pub async fn disable(&self, persist: bool) -> Result<bool> {
        if persist {
            self.persist_nfc_on(false);
        }
        let (done, result) = oneshot::channel();
        self.submit(LifecycleTask::Disable { done: Some(done) })
            .await?;
        result.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Current adapter state.
    #[must_use]
    pub fn adapter_state(&self) -> AdapterState {
        *self.state_rx.borrow()
    }

    /// Watch channel following every adapter state change.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<AdapterState> {
        self.state_rx.clone()
    }

    /// Subscribe to outward service events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events_out.subscribe()
    }

    /// Stop polling for at most `timeout`.
    ///
    /// # Errors
    /// Rejects a zero timeout or one beyond the configured maximum.
    pub async fn pause_polling(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() || timeout > self.config.max_polling_pause {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "refusing to pause polling"
            );
            return Err(ServiceError::PauseTimeoutOutOfRange {
                millis: timeout.as_millis() as u64,
            });
        }
        let (ack, done) = oneshot::channel();
        self.send_loop(LoopMessage::PausePolling { timeout, ack })?;
        done.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Resume polling before the pause timeout fires. A no-op when
    /// polling is not paused.
    pub fn resume_polling(&self) -> Result<()> {
        self.send_loop(LoopMessage::ResumePolling)
    }

    /// Register a reader-mode session (last writer wins).
    ///
    /// Discovered tags arrive on the returned session instead of going
    /// through foreground dispatch. Dropping the session revokes the
    /// registration.
    ///
    /// # Errors
    /// Fails with [`ServiceError::NotEnabled`] unless the adapter is on.
    pub async fn set_reader_mode(
        &self,
        flags: ReaderModeFlags,
        options: ReaderModeOptions,
    ) -> Result<ReaderModeSession> {
        let (tags_tx, tags_rx) = mpsc::channel::<DispatchedTag>(READER_CHANNEL_DEPTH);
        let (reply, answer) = oneshot::channel();
        self.send_loop(LoopMessage::SetReaderMode {
            flags,
            presence_check_delay: options.presence_check_delay,
            tags: tags_tx,
            reply,
        })?;
        answer
            .await
            .map_err(|_| ServiceError::ServiceStopped)??;
        Ok(ReaderModeSession::new(tags_rx))
    }

    /// Explicitly clear the reader-mode registration.
    pub async fn clear_reader_mode(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send_loop(LoopMessage::ClearReaderMode {
            generation: None,
            ack: Some(ack),
        })?;
        done.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Ignore a discovered tag until it physically leaves the field.
    ///
    /// While the debounce is active, re-sightings of the same tag are
    /// silently dropped. Returns `None` if the handle is unknown,
    /// otherwise a watch resolving when the tag is gone.
    pub async fn ignore_tag(
        &self,
        handle: TagHandle,
        debounce: Duration,
    ) -> Result<Option<TagRemovalWatch>> {
        let (removed, removed_rx) = oneshot::channel();
        let (reply, answer) = oneshot::channel();
        self.send_loop(LoopMessage::IgnoreTag {
            handle,
            debounce,
            removed,
            reply,
        })?;
        let accepted = answer.await.map_err(|_| ServiceError::ServiceStopped)?;
        Ok(accepted.then_some(TagRemovalWatch { rx: removed_rx }))
    }

    /// Report a screen/keyguard state change.
    pub fn screen_state_changed(&self, state: ScreenState) -> Result<()> {
        self.send_loop(LoopMessage::ScreenStateChanged(state))
    }

    /// Report that setup-wizard provisioning finished.
    pub fn provisioning_complete(&self) -> Result<()> {
        self.send_loop(LoopMessage::ProvisioningComplete)
    }

    /// Register a lock-screen unlock handler polling `techs`.
    pub async fn add_unlock_handler(
        &self,
        techs: nearfield_core::TechMask,
    ) -> Result<UnlockHandlerId> {
        let (reply, answer) = oneshot::channel();
        self.send_loop(LoopMessage::AddUnlockHandler { techs, reply })?;
        answer.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Remove a lock-screen unlock handler. Returns whether it existed.
    pub async fn remove_unlock_handler(&self, id: UnlockHandlerId) -> Result<bool> {
        let (reply, answer) = oneshot::channel();
        self.send_loop(LoopMessage::RemoveUnlockHandler { id, reply })?;
        answer.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Stage an AID route on the controller.
    pub async fn route_aid(&self, aid: Bytes, route: u32, aid_info: u32) -> Result<()> {
        self.submit(LifecycleTask::RouteAid {
            aid,
            route,
            aid_info,
        })
        .await
    }

    /// Remove a staged AID route.
    pub async fn unroute_aid(&self, aid: Bytes) -> Result<()> {
        self.submit(LifecycleTask::UnrouteAid { aid }).await
    }

    /// Commit the staged routing table, if discovery is running.
    pub async fn commit_routing(&self) -> Result<()> {
        self.submit(LifecycleTask::CommitRouting).await
    }

    /// Rebuild the transaction-event package cache from the registry.
    pub fn refresh_package_cache(&self) -> Result<()> {
        self.send_loop(LoopMessage::RefreshPackageCache)
    }

    /// Stop the service tasks.
    pub async fn shutdown(&self) -> Result<()> {
        self.submit(LifecycleTask::Shutdown).await?;
        self.send_loop(LoopMessage::Shutdown)
    }

    fn persist_nfc_on(&self, on: bool) {
        let mut prefs = match self.prefs.load() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "failed to load preferences");
                return;
            }
        };
        prefs.nfc_on = on;
        prefs.updated_at = Utc::now();
        if let Err(e) = self.prefs.store(&prefs) {
            warn!(error = %e, "failed to persist NFC on/off preference");
        }
    }

    async fn submit(&self, task: LifecycleTask) -> Result<()> {
        self.lifecycle_tx
            .send(task)
            .await
            .map_err(|_| ServiceError::ServiceStopped)
    }

    fn send_loop(&self, message: LoopMessage) -> Result<()> {
        self.loop_tx
            .send(message)
            .map_err(|_| ServiceError::ServiceStopped)
    }
}
