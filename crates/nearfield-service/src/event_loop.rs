//! The single-threaded service event loop.
//!
//! Every hardware event and every internally scheduled work item funnels
//! into one FIFO queue drained by one task, which owns all mutable service
//! state after construction. That single fact replaces almost every lock
//! this service would otherwise need: routing evaluation, tag dispatch,
//! debounce bookkeeping and reader-mode changes can never run concurrently
//! with each other.
//!
//! The lifecycle worker is the one other mutator in the system (it owns
//! the adapter state) and talks to the loop through acknowledged
//! round-trip messages; the loop never waits on the worker, so the two
//! cannot deadlock.

use crate::config::ServiceConfig;
use crate::discovery::{PolicyInputs, compute_discovery_parameters};
use crate::packages::{PackageCache, PackageRegistry};
use crate::reader::ActiveReaderMode;
use crate::stats::DetectionCounters;
use crate::traits::{DispatchStatus, DispatchedTag, FeedbackCue, FeedbackSink, TagDispatcher};
use crate::unlock::{UnlockHandlerId, UnlockHandlerRegistry};
use crate::watchdog::Watchdog;
use bytes::Bytes;
use nearfield_core::{
    AdapterState, DiscoveryParameters, NdefMessage, ScreenState, TagHandle, TagUid, TechMask,
};
use nearfield_hal::{AnyDeviceHost, AnyTagEndpoint, DeviceHost, HostEvent, TagEndpoint};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outward-facing service notification.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ServiceEvent {
    /// An external RF field appeared near the antenna.
    FieldActivated,

    /// The external RF field went away.
    FieldDeactivated,

    /// A remote reader opened a host card-emulation session.
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
        /// Transaction payload.
        data: Bytes,
        /// Secure element that handled the transaction.
        origin: String,
        /// Packages authorized to observe the event.
        allowed_packages: Vec<String>,
    },
}

/// Messages drained by the event loop.
pub(crate) enum LoopMessage {
    /// Forwarded hardware event.
    Host(HostEvent),

    /// Re-evaluate and possibly push discovery parameters.
    ApplyRouting {
        force: bool,
        ack: Option<oneshot::Sender<()>>,
    },

    /// Deferred routing retry fired.
    RetryApplyRouting,

    /// The platform reported a screen/keyguard change.
    ScreenStateChanged(ScreenState),

    /// Setup-wizard provisioning finished.
    ProvisioningComplete,

    /// Stop polling for a bounded period.
    PausePolling {
        timeout: Duration,
        ack: oneshot::Sender<()>,
    },

    /// Resume polling before the pause timeout, or when it fires.
    ResumePolling,

    /// Install a reader-mode registration (last writer wins).
    SetReaderMode {
        flags: nearfield_core::ReaderModeFlags,
        presence_check_delay: Duration,
        tags: mpsc::Sender<DispatchedTag>,
        reply: oneshot::Sender<crate::Result<()>>,
    },

    /// Revoke the reader-mode registration. `generation` is `Some` when
    /// the revocation comes from the liveness monitor and must be ignored
    /// if a newer registration has taken over.
    ClearReaderMode {
        generation: Option<u64>,
        ack: Option<oneshot::Sender<()>>,
    },

    /// Caller asked to ignore a tag until it physically leaves.
    IgnoreTag {
        handle: TagHandle,
        debounce: Duration,
        removed: oneshot::Sender<()>,
        reply: oneshot::Sender<bool>,
    },

    /// Debounce window elapsed without the tag reappearing.
    DebounceExpired,

    /// A presence watcher observed its tag leaving the field.
    TagDisconnected { handle: TagHandle },

    /// Register a lock-screen unlock handler.
    AddUnlockHandler {
        techs: TechMask,
        reply: oneshot::Sender<UnlockHandlerId>,
    },

    /// Remove a lock-screen unlock handler.
    RemoveUnlockHandler {
        id: UnlockHandlerId,
        reply: oneshot::Sender<bool>,
    },

    /// Rebuild the transaction-event package cache.
    RefreshPackageCache,

    /// Lifecycle worker wants to know whether discovery is running.
    QueryDiscoveryActive { reply: oneshot::Sender<bool> },

    /// Enable sequence succeeded: start a fresh session.
    SessionReset { ack: oneshot::Sender<()> },

    /// Disable sequence starting: quiesce tag traffic.
    PrepareShutdown { ack: oneshot::Sender<()> },

    /// Disable sequence finished: settle to the off configuration.
    SessionEnded { ack: oneshot::Sender<()> },

    /// Flush detection counters to the log.
    FlushStats,

    /// Stop the loop.
    Shutdown,
}

/// A live entry in the handle table.
enum Endpoint {
    Tag(AnyTagEndpoint),
    P2pPeer { initiator: bool },
}

struct EndpointEntry {
    endpoint: Endpoint,
    /// Presence watcher task, for tag endpoints.
    watcher: Option<JoinHandle<()>>,
}

impl EndpointEntry {
    fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Active debounce suppression for one tag.
struct DebounceState {
    uid: TagUid,
    duration: Duration,
    handle: TagHandle,
    removed: Option<oneshot::Sender<()>>,
    timer: JoinHandle<()>,
}

pub(crate) struct EventLoop {
    host: Arc<AnyDeviceHost>,
    dispatcher: Arc<dyn TagDispatcher>,
    feedback: Arc<dyn FeedbackSink>,
    registry: Arc<dyn PackageRegistry>,
    config: ServiceConfig,

    state_rx: watch::Receiver<AdapterState>,
    self_tx: mpsc::UnboundedSender<LoopMessage>,
    messages: mpsc::UnboundedReceiver<LoopMessage>,
    events_out: broadcast::Sender<ServiceEvent>,

    screen_state: ScreenState,
    in_provision_mode: bool,
    polling_paused: bool,
    current_params: DiscoveryParameters,

    endpoints: HashMap<TagHandle, EndpointEntry>,
    reader_mode: Option<ActiveReaderMode>,
    reader_generation: u64,
    debounce: Option<DebounceState>,
    last_read_ndef: Option<NdefMessage>,
    unlock_handlers: UnlockHandlerRegistry,
    packages: PackageCache,
    counters: DetectionCounters,

    pending_resume: Option<JoinHandle<()>>,
    pending_routing_retry: Option<JoinHandle<()>>,
}

impl EventLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        host: Arc<AnyDeviceHost>,
        dispatcher: Arc<dyn TagDispatcher>,
        feedback: Arc<dyn FeedbackSink>,
        registry: Arc<dyn PackageRegistry>,
        config: ServiceConfig,
        state_rx: watch::Receiver<AdapterState>,
        self_tx: mpsc::UnboundedSender<LoopMessage>,
        messages: mpsc::UnboundedReceiver<LoopMessage>,
        events_out: broadcast::Sender<ServiceEvent>,
    ) -> Self {
        let screen_state = config.initial_screen_state;
        let in_provision_mode = config.in_provision_mode;
        let mut packages = PackageCache::default();
        packages.refresh(registry.as_ref());
        EventLoop {
            host,
            dispatcher,
            feedback,
            registry,
            config,
            state_rx,
            self_tx,
            messages,
            events_out,
            screen_state,
            in_provision_mode,
            polling_paused: false,
            current_params: DiscoveryParameters::nfc_off(),
            endpoints: HashMap::new(),
            reader_mode: None,
            reader_generation: 0,
            debounce: None,
            last_read_ndef: None,
            unlock_handlers: UnlockHandlerRegistry::default(),
            packages,
            counters: DetectionCounters::default(),
            pending_resume: None,
            pending_routing_retry: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("event loop started");
        while let Some(message) = self.messages.recv().await {
            match message {
                LoopMessage::Host(event) => self.on_host_event(event).await,
                LoopMessage::ApplyRouting { force, ack } => {
                    self.apply_routing(force).await;
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                LoopMessage::RetryApplyRouting => {
                    self.pending_routing_retry = None;
                    self.apply_routing(false).await;
                }
                LoopMessage::ScreenStateChanged(state) => {
                    self.on_screen_state_changed(state).await;
                }
                LoopMessage::ProvisioningComplete => {
                    if self.in_provision_mode {
                        info!("provisioning complete, dropping provisioning policy");
                        self.in_provision_mode = false;
                        self.apply_routing(false).await;
                    }
                }
                LoopMessage::PausePolling { timeout, ack } => {
                    self.on_pause_polling(timeout).await;
                    let _ = ack.send(());
                }
                LoopMessage::ResumePolling => self.on_resume_polling().await,
                LoopMessage::SetReaderMode {
                    flags,
                    presence_check_delay,
                    tags,
                    reply,
                } => {
                    let result = self
                        .on_set_reader_mode(flags, presence_check_delay, tags)
                        .await;
                    let _ = reply.send(result);
                }
                LoopMessage::ClearReaderMode { generation, ack } => {
                    self.on_clear_reader_mode(generation).await;
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                LoopMessage::IgnoreTag {
                    handle,
                    debounce,
                    removed,
                    reply,
                } => {
                    let accepted = self.on_ignore_tag(handle, debounce, removed).await;
                    let _ = reply.send(accepted);
                }
                LoopMessage::DebounceExpired => self.on_debounce_expired(),
                LoopMessage::TagDisconnected { handle } => {
                    self.on_tag_disconnected(handle).await;
                }
                LoopMessage::AddUnlockHandler { techs, reply } => {
                    let id = self.unlock_handlers.register(techs);
                    self.apply_routing(false).await;
                    let _ = reply.send(id);
                }
                LoopMessage::RemoveUnlockHandler { id, reply } => {
                    let removed = self.unlock_handlers.unregister(id);
                    self.apply_routing(false).await;
                    let _ = reply.send(removed);
                }
                LoopMessage::RefreshPackageCache => {
                    self.packages.refresh(self.registry.as_ref());
                }
                LoopMessage::QueryDiscoveryActive { reply } => {
                    let _ = reply.send(self.current_params.should_enable_discovery());
                }
                LoopMessage::SessionReset { ack } => {
                    self.on_session_reset();
                    let _ = ack.send(());
                }
                LoopMessage::PrepareShutdown { ack } => {
                    self.on_prepare_shutdown().await;
                    let _ = ack.send(());
                }
                LoopMessage::SessionEnded { ack } => {
                    self.current_params = DiscoveryParameters::nfc_off();
                    self.feedback.release();
                    let _ = ack.send(());
                }
                LoopMessage::FlushStats => self.counters.flush(),
                LoopMessage::Shutdown => break,
            }
        }
        self.quiesce();
        debug!("event loop stopped");
    }

    // ------------------------------------------------------------------
    // Hardware events
    // ------------------------------------------------------------------

    async fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::TagDiscovered(tag) => self.on_tag_discovered(tag).await,
            HostEvent::PeerActivated { handle, initiator } => {
                debug!(%handle, initiator, "peer activated");
                self.endpoints.insert(
                    handle,
                    EndpointEntry {
                        endpoint: Endpoint::P2pPeer { initiator },
                        watcher: None,
                    },
                );
            }
            HostEvent::PeerDeactivated { handle } => {
                debug!(%handle, "peer deactivated, polling loop restarts");
                self.endpoints.remove(&handle);
            }
            HostEvent::PeerFirstPacket { handle } => {
                debug!(%handle, "first packet on peer link");
                self.counters.record_p2p();
            }
            HostEvent::FieldActivated => {
                let _ = self.events_out.send(ServiceEvent::FieldActivated);
            }
            HostEvent::FieldDeactivated => {
                let _ = self.events_out.send(ServiceEvent::FieldDeactivated);
            }
            HostEvent::HceActivated { technology } => {
                let _ = self
                    .events_out
                    .send(ServiceEvent::HceActivated { technology });
            }
            HostEvent::HceData { technology, data } => {
                let _ = self
                    .events_out
                    .send(ServiceEvent::HceData { technology, data });
            }
            HostEvent::HceDeactivated { technology } => {
                self.counters.record_hce();
                let _ = self
                    .events_out
                    .send(ServiceEvent::HceDeactivated { technology });
            }
            HostEvent::Transaction { aid, data, origin } => {
                self.on_transaction(aid, data, origin);
            }
            _ => {}
        }
    }

    fn on_transaction(&mut self, aid: Bytes, data: Bytes, origin: String) {
        if self.packages.is_empty() {
            debug!("no package holds the transaction-event permission, dropping event");
            return;
        }
        self.counters.record_transaction();
        let _ = self.events_out.send(ServiceEvent::Transaction {
            aid,
            data,
            origin,
            allowed_packages: self.packages.authorized(),
        });
    }

    // ------------------------------------------------------------------
    // Tag dispatch pipeline
    // ------------------------------------------------------------------

    async fn on_tag_discovered(&mut self, tag: AnyTagEndpoint) {
        debug!(uid = %tag.uid(), handle = %tag.handle(), "tag detected");
        self.counters.record_tag();

        let reader = self.reader_mode.clone();
        let presence_delay = reader
            .as_ref()
            .map(|r| r.presence_check_delay)
            .unwrap_or(self.config.default_presence_check_delay);

        if let Some(reader) = &reader {
            if reader.flags.skip_ndef_check {
                debug!("skipping NDEF detection in reader mode");
                self.dispatch_tag(tag, None, presence_delay).await;
                return;
            }
        }

        if tag.connected_technology() == TechMask::KOVIO {
            // Barcode-class tags are active too briefly for an NDEF probe.
            debug!("skipping NDEF detection for barcode tag");
            self.dispatch_tag(tag, None, presence_delay).await;
            return;
        }

        let ndef = match tag.read_ndef().await {
            Ok(message) => message,
            Err(e) => {
                // One reconnect attempt distinguishes a bad read from a
                // tag that already left the field.
                debug!(error = %e, "NDEF read failed, reconnecting");
                if tag.reconnect().await.is_err() {
                    let _ = tag.disconnect().await;
                    debug!("reconnect failed, dropping tag");
                    return;
                }
                None
            }
        };

        let suppressed = match &mut self.debounce {
            Some(db) => {
                let uid_match = db.uid == tag.uid();
                let ndef_match = ndef
                    .as_ref()
                    .is_some_and(|m| Some(m) == self.last_read_ndef.as_ref());
                if uid_match || ndef_match {
                    // Same physical contact resurfacing: restart the
                    // window and drop the sighting silently.
                    db.timer.abort();
                    db.timer = schedule_debounce_timeout(&self.self_tx, db.duration);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if suppressed {
            debug!(uid = %tag.uid(), "tag suppressed by debounce");
            let _ = tag.disconnect().await;
            return;
        }
        // A different tag ends any active debounce: the ignored tag is
        // gone.
        if let Some(db) = self.debounce.take() {
            db.timer.abort();
            if let Some(removed) = db.removed {
                let _ = removed.send(());
            }
        }

        self.last_read_ndef = ndef.clone();
        self.dispatch_tag(tag, ndef, presence_delay).await;
    }

    async fn dispatch_tag(
        &mut self,
        tag: AnyTagEndpoint,
        ndef: Option<NdefMessage>,
        presence_delay: Duration,
    ) {
        let mut dispatched = DispatchedTag {
            handle: tag.handle(),
            uid: tag.uid(),
            technologies: tag.technologies(),
            ndef,
        };
        self.register_endpoint(tag, presence_delay);

        if let Some(reader) = &self.reader_mode {
            if !reader.flags.suppress_feedback {
                self.feedback.play(FeedbackCue::Confirm);
            }
            match reader.tags.try_send(dispatched) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("reader mode consumer lagging, dropping tag");
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(tag)) => {
                    // Consumer died between the liveness notification and
                    // now; fall back to the normal path.
                    warn!("reader mode consumer gone, falling back to dispatch");
                    dispatched = tag;
                }
            }
        }

        let handle = dispatched.handle;
        match self.dispatcher.dispatch(dispatched) {
            DispatchStatus::Delivered => self.feedback.play(FeedbackCue::Confirm),
            DispatchStatus::Rejected => {
                self.feedback.play(FeedbackCue::Error);
                self.remove_endpoint(handle);
            }
        }
    }

    fn register_endpoint(&mut self, tag: AnyTagEndpoint, presence_delay: Duration) {
        let handle = tag.handle();
        let watcher = spawn_presence_watcher(tag.clone(), presence_delay, self.self_tx.clone());
        if let Some(mut old) = self.endpoints.insert(
            handle,
            EndpointEntry {
                endpoint: Endpoint::Tag(tag),
                watcher: Some(watcher),
            },
        ) {
            old.stop_watcher();
        }
    }

    fn remove_endpoint(&mut self, handle: TagHandle) {
        if let Some(mut entry) = self.endpoints.remove(&handle) {
            entry.stop_watcher();
        }
    }

    async fn on_tag_disconnected(&mut self, handle: TagHandle) {
        debug!(%handle, "tag left the field");
        self.remove_endpoint(handle);
        self.apply_routing(false).await;
    }

    async fn on_ignore_tag(
        &mut self,
        handle: TagHandle,
        debounce: Duration,
        removed: oneshot::Sender<()>,
    ) -> bool {
        if debounce.is_zero()
            && let Some(db) = self.debounce.take_if(|db| db.handle == handle)
        {
            // Caller wants the pending debounce resolved now.
            db.timer.abort();
            if let Some(tx) = db.removed {
                let _ = tx.send(());
            }
            let _ = removed.send(());
            return true;
        }

        let is_tag = matches!(
            self.endpoints.get(&handle),
            Some(EndpointEntry {
                endpoint: Endpoint::Tag(_),
                ..
            })
        );
        if !is_tag {
            warn!(%handle, "ignore requested for unknown handle");
            return false;
        }
        let Some(mut entry) = self.endpoints.remove(&handle) else {
            return false;
        };
        entry.stop_watcher();
        let Endpoint::Tag(tag) = entry.endpoint else {
            return false;
        };

        if let Some(old) = self.debounce.take() {
            old.timer.abort();
        }
        self.debounce = Some(DebounceState {
            uid: tag.uid(),
            duration: debounce,
            handle,
            removed: Some(removed),
            timer: schedule_debounce_timeout(&self.self_tx, debounce),
        });

        // Disconnecting resumes the polling loop so the departure can be
        // observed.
        let _ = tag.disconnect().await;
        true
    }

    fn on_debounce_expired(&mut self) {
        match self.debounce.take() {
            Some(db) => {
                debug!(uid = %db.uid, "debounced tag did not reappear");
                if let Some(removed) = db.removed {
                    let _ = removed.send(());
                }
            }
            None => {
                // Timer fired after the record was already cleared; a
                // stale wakeup, not a caller-visible condition.
                error!("debounce timeout with no outstanding record");
            }
        }
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    async fn apply_routing(&mut self, force: bool) {
        let adapter = *self.state_rx.borrow();
        if !(adapter == AdapterState::On || adapter == AdapterState::TurningOff) {
            return;
        }

        // Transitioning to unlocked while still talking to a tag:
        // reconfiguring now would yank the link mid-transaction, so retry
        // shortly instead.
        if self.screen_state == ScreenState::OnUnlocked && self.any_tag_present().await {
            debug!("not updating discovery parameters, tag connected");
            if let Some(old) = self.pending_routing_retry.take() {
                old.abort();
            }
            let tx = self.self_tx.clone();
            let delay = self.config.apply_routing_retry_delay;
            self.pending_routing_retry = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(LoopMessage::RetryApplyRouting);
            }));
            return;
        }

        let watchdog = Watchdog::arm(
            Arc::clone(&self.host),
            "applyRouting",
            self.config.routing_watchdog,
        );

        let new_params = self.compute_parameters();
        if force || new_params != self.current_params {
            info!(params = %new_params, force, "applying discovery parameters");
            let result = if new_params.should_enable_discovery() {
                let restart = self.current_params.should_enable_discovery();
                self.host.enable_discovery(&new_params, restart).await
            } else {
                self.host.disable_discovery().await
            };
            if let Err(e) = result {
                warn!(error = %e, "controller rejected discovery reconfiguration");
            }
            self.current_params = new_params;
        } else {
            debug!("discovery configuration equal, not updating");
        }

        // The evaluation happened; any postponed retry is obsolete.
        if let Some(retry) = self.pending_routing_retry.take() {
            retry.abort();
        }

        watchdog.disarm();
    }

    fn compute_parameters(&self) -> DiscoveryParameters {
        let inputs = PolicyInputs {
            screen_state: self.screen_state,
            reader_mode: self.reader_mode.as_ref().map(|r| &r.flags),
            in_provision_mode: self.in_provision_mode,
            lockscreen_poll_mask: self.unlock_handlers.poll_mask(),
            live_case_mask: self.config.live_case_techs,
            hce_capable: self.config.hce_capable,
        };
        compute_discovery_parameters(&inputs)
    }

    async fn any_tag_present(&self) -> bool {
        for entry in self.endpoints.values() {
            if let Endpoint::Tag(tag) = &entry.endpoint {
                if tag.is_present().await {
                    return true;
                }
            }
        }
        false
    }

    async fn on_screen_state_changed(&mut self, state: ScreenState) {
        if state == self.screen_state {
            return;
        }
        info!(screen = %state, "screen state changed");
        self.screen_state = state;
        if *self.state_rx.borrow() == AdapterState::TurningOff {
            return;
        }
        self.apply_routing(false).await;
    }

    // ------------------------------------------------------------------
    // Polling pause
    // ------------------------------------------------------------------

    async fn on_pause_polling(&mut self, timeout: Duration) {
        info!(timeout_ms = timeout.as_millis() as u64, "pausing polling");
        self.polling_paused = true;
        if let Err(e) = self.host.disable_discovery().await {
            warn!(error = %e, "failed to stop discovery for pause");
        }
        if let Some(old) = self.pending_resume.take() {
            old.abort();
        }
        let tx = self.self_tx.clone();
        self.pending_resume = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(LoopMessage::ResumePolling);
        }));
    }

    async fn on_resume_polling(&mut self) {
        if !self.polling_paused {
            return;
        }
        info!("resuming polling");
        if let Some(timer) = self.pending_resume.take() {
            timer.abort();
        }
        self.polling_paused = false;
        self.apply_routing(true).await;
    }

    // ------------------------------------------------------------------
    // Reader mode
    // ------------------------------------------------------------------

    async fn on_set_reader_mode(
        &mut self,
        flags: nearfield_core::ReaderModeFlags,
        presence_check_delay: Duration,
        tags: mpsc::Sender<DispatchedTag>,
    ) -> crate::Result<()> {
        if !self.state_rx.borrow().is_on() {
            warn!("reader mode requested while NFC is not enabled");
            return Err(crate::ServiceError::NotEnabled);
        }

        self.reader_generation += 1;
        let generation = self.reader_generation;

        // Liveness monitor: a dropped session resolves `closed()` and the
        // revocation flows through the loop like any other message.
        let monitor_tags = tags.clone();
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            monitor_tags.closed().await;
            let _ = tx.send(LoopMessage::ClearReaderMode {
                generation: Some(generation),
                ack: None,
            });
        });

        info!(techs = %flags.techs, generation, "reader mode registered");
        self.reader_mode = Some(ActiveReaderMode {
            flags,
            presence_check_delay,
            tags,
            generation,
        });
        self.apply_routing(false).await;
        Ok(())
    }

    async fn on_clear_reader_mode(&mut self, generation: Option<u64>) {
        let Some(active_generation) = self.reader_mode.as_ref().map(|r| r.generation)
        else {
            return;
        };
        match generation {
            // Stale liveness notification for a superseded registration.
            Some(g) if g != active_generation => return,
            Some(_) => {
                info!("reader mode owner died, revoking registration");
                self.reader_mode = None;
            }
            None => {
                info!("reader mode cleared");
                self.reader_mode = None;
                self.stop_presence_watchers();
            }
        }
        self.apply_routing(false).await;
    }

    fn stop_presence_watchers(&mut self) {
        for entry in self.endpoints.values_mut() {
            entry.stop_watcher();
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle round-trips
    // ------------------------------------------------------------------

    fn on_session_reset(&mut self) {
        debug!("starting fresh tag session");
        for entry in self.endpoints.values_mut() {
            entry.stop_watcher();
        }
        self.endpoints.clear();
        self.polling_paused = false;
        if let Some(timer) = self.pending_resume.take() {
            timer.abort();
        }
        if let Some(timer) = self.pending_routing_retry.take() {
            timer.abort();
        }
        self.feedback.prepare();
    }

    async fn on_prepare_shutdown(&mut self) {
        debug!("quiescing tag traffic for shutdown");
        if let Some(timer) = self.pending_resume.take() {
            timer.abort();
        }
        if let Some(timer) = self.pending_routing_retry.take() {
            timer.abort();
        }
        let entries: Vec<_> = self.endpoints.drain().collect();
        for (handle, mut entry) in entries {
            entry.stop_watcher();
            match entry.endpoint {
                Endpoint::Tag(tag) => {
                    debug!(%handle, "disconnecting tag");
                    let _ = tag.disconnect().await;
                }
                Endpoint::P2pPeer { initiator } => {
                    // An initiating remote cannot be disconnected from our
                    // side; wait for field removal.
                    debug!(%handle, initiator, "dropping peer entry");
                }
            }
        }
    }

    fn quiesce(&mut self) {
        self.stop_presence_watchers();
        self.endpoints.clear();
        if let Some(db) = self.debounce.take() {
            db.timer.abort();
        }
        if let Some(timer) = self.pending_resume.take() {
            timer.abort();
        }
        if let Some(timer) = self.pending_routing_retry.take() {
            timer.abort();
        }
    }
}

fn spawn_presence_watcher(
    tag: AnyTagEndpoint,
    delay: Duration,
    tx: mpsc::UnboundedSender<LoopMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let handle = tag.handle();
        loop {
            tokio::time::sleep(delay).await;
            if !tag.is_present().await {
                let _ = tag.disconnect().await;
                let _ = tx.send(LoopMessage::TagDisconnected { handle });
                break;
            }
        }
    })
}

fn schedule_debounce_timeout(
    tx: &mpsc::UnboundedSender<LoopMessage>,
    delay: Duration,
) -> JoinHandle<()> {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(LoopMessage::DebounceExpired);
    })
}
