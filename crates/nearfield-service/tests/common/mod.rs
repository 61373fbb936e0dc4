//! Shared harness for service integration tests.
//!
//! Builds a full service over a mock controller with recording
//! collaborators, and provides the small helpers the tests lean on
//! (state waiting, virtual-time settling, tag construction).

#![allow(dead_code)]

use chrono::Utc;
use nearfield_core::{AdapterState, NdefMessage, TagHandle, TagUid};
use nearfield_hal::mock::{MockDeviceHost, MockHostController, MockTagEndpoint};
use nearfield_hal::{AnyDeviceHost, host_event_channel};
use nearfield_service::prefs::{MemoryPreferenceStore, PreferenceStore, Preferences};
use nearfield_service::{
    DispatchStatus, DispatchedTag, FeedbackCue, FeedbackSink, NfcService, Result,
    ServiceConfig, ServiceHandle, StaticPackageRegistry, TagDispatcher,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Dispatcher that records every tag and answers with a scripted status.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    inner: Arc<DispatcherState>,
}

#[derive(Default)]
struct DispatcherState {
    dispatched: Mutex<Vec<DispatchedTag>>,
    reject: AtomicBool,
}

impl RecordingDispatcher {
    pub fn reject_all(&self) {
        self.inner.reject.store(true, Ordering::SeqCst);
    }

    pub fn dispatched(&self) -> Vec<DispatchedTag> {
        self.inner.dispatched.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.inner.dispatched.lock().unwrap().len()
    }
}

impl TagDispatcher for RecordingDispatcher {
    fn dispatch(&self, tag: DispatchedTag) -> DispatchStatus {
        self.inner.dispatched.lock().unwrap().push(tag);
        if self.inner.reject.load(Ordering::SeqCst) {
            DispatchStatus::Rejected
        } else {
            DispatchStatus::Delivered
        }
    }
}

/// Feedback sink recording cues and the prepare/release bracket.
#[derive(Clone, Default)]
pub struct RecordingFeedback {
    inner: Arc<FeedbackState>,
}

#[derive(Default)]
struct FeedbackState {
    cues: Mutex<Vec<FeedbackCue>>,
    prepared: AtomicBool,
}

impl RecordingFeedback {
    pub fn cues(&self) -> Vec<FeedbackCue> {
        self.inner.cues.lock().unwrap().clone()
    }

    pub fn prepared(&self) -> bool {
        self.inner.prepared.load(Ordering::SeqCst)
    }
}

impl FeedbackSink for RecordingFeedback {
    fn prepare(&self) {
        self.inner.prepared.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.inner.prepared.store(false, Ordering::SeqCst);
    }

    fn play(&self, cue: FeedbackCue) {
        self.inner.cues.lock().unwrap().push(cue);
    }
}

/// Preference store shared between the service and the test.
#[derive(Clone)]
pub struct SharedPrefs(pub Arc<MemoryPreferenceStore>);

impl PreferenceStore for SharedPrefs {
    fn load(&self) -> Result<Preferences> {
        self.0.load()
    }

    fn store(&self, prefs: &Preferences) -> Result<()> {
        self.0.store(prefs)
    }
}

/// Everything a test needs to drive and observe the service.
pub struct TestBed {
    pub handle: ServiceHandle,
    pub controller: MockHostController,
    pub dispatcher: RecordingDispatcher,
    pub feedback: RecordingFeedback,
    pub prefs: SharedPrefs,
}

/// Configuration with timings shrunk for virtual-time tests.
pub fn fast_config() -> ServiceConfig {
    ServiceConfig {
        init_watchdog: Duration::from_millis(500),
        routing_watchdog: Duration::from_millis(200),
        default_presence_check_delay: Duration::from_millis(10),
        apply_routing_retry_delay: Duration::from_millis(100),
        stats_flush_interval: Duration::from_secs(3600),
        ..ServiceConfig::default()
    }
}

/// Preferences for a quiet start: boot does not enable anything.
pub fn quiet_prefs() -> Preferences {
    Preferences {
        nfc_on: false,
        first_boot: false,
        updated_at: Utc::now(),
    }
}

pub fn start_service(config: ServiceConfig) -> TestBed {
    start_service_with(config, quiet_prefs(), Vec::new())
}

pub fn start_service_with(
    config: ServiceConfig,
    prefs: Preferences,
    event_packages: Vec<String>,
) -> TestBed {
    init_tracing();
    let (events_tx, events_rx) = host_event_channel();
    let (host, controller) = MockDeviceHost::new(events_tx);

    let dispatcher = RecordingDispatcher::default();
    let feedback = RecordingFeedback::default();
    let prefs = SharedPrefs(Arc::new(MemoryPreferenceStore::new(prefs)));

    let mut service = NfcService::new(config);
    service.set_dispatcher(dispatcher.clone());
    service.set_feedback(feedback.clone());
    service.set_preference_store(prefs.clone());
    service.set_package_registry(StaticPackageRegistry::new(event_packages));
    let handle = service.start(AnyDeviceHost::Mock(host), events_rx);

    TestBed {
        handle,
        controller,
        dispatcher,
        feedback,
        prefs,
    }
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let queued messages and due timers drain under virtual time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::task::yield_now().await;
}

/// Wait until the adapter reaches `target`, failing after a virtual
/// minute.
pub async fn wait_for_state(handle: &ServiceHandle, target: AdapterState) {
    let mut watch = handle.state_watch();
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            if *watch.borrow() == target {
                return;
            }
            watch
                .changed()
                .await
                .expect("state channel closed while waiting");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("adapter never reached {target}"));
}

pub fn tag(handle: u32, uid: &[u8]) -> MockTagEndpoint {
    MockTagEndpoint::new(TagHandle::new(handle), TagUid::new(uid.to_vec()).unwrap())
}

pub fn ndef(payload: &[u8]) -> NdefMessage {
    NdefMessage::new(payload.to_vec())
}
