//! The serialized enable/disable worker.
//!
//! Everything that can turn the controller on or off runs on this one
//! task, drained from a bounded FIFO queue. That keeps the adapter state
//! trivially correct: it is only ever written here, each task observes the
//! resting state the previous task left behind, and a disable submitted
//! while an enable is still executing runs immediately after it, never
//! interleaved and never dropped.
//!
//! The worker owns the only blocking controller calls in the service
//! (`initialize`, `deinitialize`, `commit_routing`); each one is bracketed
//! by a [`Watchdog`]. The event loop is never blocked by any of this: the
//! worker hands session bookkeeping to the loop through acknowledged
//! messages and waits for the answer, one direction only.

use crate::config::ServiceConfig;
use crate::event_loop::LoopMessage;
use crate::prefs::PreferenceStore;
use crate::traits::WakeLock;
use crate::watchdog::Watchdog;
use bytes::Bytes;
use chrono::Utc;
use nearfield_core::AdapterState;
use nearfield_hal::{AnyDeviceHost, DeviceHost};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Work items accepted by the lifecycle worker.
pub(crate) enum LifecycleTask {
    /// Bring the adapter up.
    Enable { done: Option<oneshot::Sender<bool>> },

    /// Bring the adapter down.
    Disable { done: Option<oneshot::Sender<bool>> },

    /// One-time startup work: first-boot factory reset, then restore the
    /// persisted on/off preference.
    Boot,

    /// Commit the staged card-emulation routing table.
    CommitRouting,

    /// Stage an AID route.
    RouteAid {
        aid: Bytes,
        route: u32,
        aid_info: u32,
    },

    /// Remove a staged AID route.
    UnrouteAid { aid: Bytes },

    /// Stop the worker.
    Shutdown,
}

pub(crate) struct LifecycleWorker {
    host: Arc<AnyDeviceHost>,
    prefs: Arc<dyn PreferenceStore>,
    wake_lock: Arc<dyn WakeLock>,
    config: ServiceConfig,
    state_tx: watch::Sender<AdapterState>,
    loop_tx: mpsc::UnboundedSender<LoopMessage>,
    tasks: mpsc::Receiver<LifecycleTask>,
}

impl LifecycleWorker {
    pub(crate) fn new(
        host: Arc<AnyDeviceHost>,
        prefs: Arc<dyn PreferenceStore>,
        wake_lock: Arc<dyn WakeLock>,
        config: ServiceConfig,
        state_tx: watch::Sender<AdapterState>,
        loop_tx: mpsc::UnboundedSender<LoopMessage>,
        tasks: mpsc::Receiver<LifecycleTask>,
    ) -> Self {
        LifecycleWorker {
            host,
            prefs,
            wake_lock,
            config,
            state_tx,
            loop_tx,
            tasks,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("lifecycle worker started");
        while let Some(task) = self.tasks.recv().await {
            // Tasks always leave a resting state behind, so observing a
            // transitional state here means a sequencing bug.
            let state = *self.state_tx.borrow();
            if !state.is_resting() {
                error!(%state, "lifecycle task starting from a transitional state");
            }
            match task {
                LifecycleTask::Enable { done } => {
                    let ok = self.enable_internal().await;
                    if let Some(done) = done {
                        let _ = done.send(ok);
                    }
                }
                LifecycleTask::Disable { done } => {
                    let ok = self.disable_internal().await;
                    if let Some(done) = done {
                        let _ = done.send(ok);
                    }
                }
                LifecycleTask::Boot => self.boot_internal().await,
                LifecycleTask::CommitRouting => self.commit_routing_internal().await,
                LifecycleTask::RouteAid {
                    aid,
                    route,
                    aid_info,
                } => {
                    if let Err(e) = self.host.route_aid(aid, route, aid_info).await {
                        warn!(error = %e, "failed to stage AID route");
                    }
                }
                LifecycleTask::UnrouteAid { aid } => {
                    if let Err(e) = self.host.unroute_aid(aid).await {
                        warn!(error = %e, "failed to remove AID route");
                    }
                }
                LifecycleTask::Shutdown => break,
            }
        }
        debug!("lifecycle worker stopped");
    }

    /// Enable the adapter. Does not touch preferences.
    async fn enable_internal(&self) -> bool {
        if *self.state_tx.borrow() == AdapterState::On {
            return true;
        }
        info!("enabling NFC");
        self.set_state(AdapterState::TurningOn);

        let watchdog = Watchdog::arm(
            Arc::clone(&self.host),
            "enableInternal",
            self.config.init_watchdog,
        );
        self.wake_lock.acquire();
        let initialized = self.host.initialize().await;
        self.wake_lock.release();
        watchdog.disarm();

        let initialized = match initialized {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "controller initialization error");
                false
            }
        };
        if !initialized {
            warn!("error enabling NFC");
            self.set_state(AdapterState::Off);
            return false;
        }

        // Fresh session: the loop clears its handle table and prepares
        // feedback resources before any tag event can arrive.
        self.roundtrip(|ack| LoopMessage::SessionReset { ack }).await;
        self.set_state(AdapterState::On);

        // Start the polling loop.
        self.roundtrip(|ack| LoopMessage::ApplyRouting {
            force: true,
            ack: Some(ack),
        })
        .await;
        true
    }

    /// Disable the adapter. Does not touch preferences.
    async fn disable_internal(&self) -> bool {
        if *self.state_tx.borrow() == AdapterState::Off {
            return true;
        }
        info!("disabling NFC");
        self.set_state(AdapterState::TurningOff);

        // De-initialization hangs on wedged controllers, hence the
        // watchdog. Disconnecting any connected tag first stops the
        // polling loop so the controller cannot rediscover it mid
        // shutdown.
        let watchdog = Watchdog::arm(
            Arc::clone(&self.host),
            "disableInternal",
            self.config.routing_watchdog,
        );

        self.roundtrip(|ack| LoopMessage::PrepareShutdown { ack })
            .await;

        let result = match self.host.deinitialize().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "controller de-initialization error");
                false
            }
        };
        debug!(result, "deinitialize finished");
        watchdog.disarm();

        self.roundtrip(|ack| LoopMessage::SessionEnded { ack }).await;
        self.set_state(AdapterState::Off);
        result
    }

    async fn boot_internal(&self) {
        let mut prefs = match self.prefs.load() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "failed to load preferences, using defaults");
                crate::prefs::Preferences::default()
            }
        };

        if prefs.first_boot {
            info!("first boot, factory resetting controller");
            prefs.first_boot = false;
            prefs.updated_at = Utc::now();
            if let Err(e) = self.prefs.store(&prefs) {
                warn!(error = %e, "failed to persist first-boot flag");
            }
            if let Err(e) = self.host.factory_reset().await {
                warn!(error = %e, "controller factory reset failed");
            }
        }

        if prefs.nfc_on {
            debug!("NFC is on, enabling");
            self.enable_internal().await;
        } else {
            debug!("NFC is off, checking firmware");
            if let Err(e) = self.host.check_firmware().await {
                warn!(error = %e, "firmware check failed");
            }
        }
    }

    async fn commit_routing_internal(&self) {
        let (reply, answer) = oneshot::channel();
        if self
            .loop_tx
            .send(LoopMessage::QueryDiscoveryActive { reply })
            .is_err()
        {
            return;
        }
        match answer.await {
            Ok(true) => {
                let watchdog = Watchdog::arm(
                    Arc::clone(&self.host),
                    "commitRouting",
                    self.config.routing_watchdog,
                );
                if let Err(e) = self.host.commit_routing().await {
                    warn!(error = %e, "routing commit failed");
                }
                watchdog.disarm();
            }
            Ok(false) => {
                debug!("not committing routing because discovery is disabled");
            }
            Err(_) => {}
        }
    }

    fn set_state(&self, new_state: AdapterState) {
        self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            info!(from = %state, to = %new_state, "adapter state changed");
            *state = new_state;
            true
        });
    }

    /// Hand a work item to the event loop and wait for its
    /// acknowledgement. A missing acknowledgement means the loop is gone,
    /// which only happens during service shutdown.
    async fn roundtrip(&self, make: impl FnOnce(oneshot::Sender<()>) -> LoopMessage) {
        let (ack, done) = oneshot::channel();
        if self.loop_tx.send(make(ack)).is_err() {
            warn!("event loop unavailable for lifecycle round-trip");
            return;
        }
        if done.await.is_err() {
            warn!("event loop dropped a lifecycle acknowledgement");
        }
    }
}
