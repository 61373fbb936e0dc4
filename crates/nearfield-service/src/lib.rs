//! NFC controller-management service.
//!
//! This crate is the service core sitting between callers and the radio
//! controller: it owns the adapter on/off lifecycle, continuously decides
//! what the controller should be polling for, and routes discovered tags
//! to consumers with debounce suppression.
//!
//! # Architecture
//!
//! ```text
//!                      ┌─────────────────────┐
//!  callers ──────────► │   ServiceHandle     │
//!                      └──────┬───────┬──────┘
//!              lifecycle queue│       │loop queue
//!                      ┌──────▼──┐ ┌──▼─────────────┐
//!                      │Lifecycle│ │  Event loop    │◄── host events
//!                      │ worker  │ │ (all state)    │
//!                      └────┬────┘ └──────┬─────────┘
//!                           │watchdogged  │
//!                      ┌────▼─────────────▼─────┐
//!                      │      DeviceHost        │
//!                      └────────────────────────┘
//! ```
//!
//! Three rules keep the concurrency tractable:
//!
//! - all mutable service state lives on the single-threaded event loop;
//! - the adapter state alone is owned by the serialized lifecycle worker,
//!   which performs the blocking controller calls under watchdogs;
//! - the worker may wait on the loop, never the other way around.

pub mod config;
pub mod discovery;
pub mod error;
mod event_loop;
mod lifecycle;
pub mod packages;
pub mod prefs;
pub mod reader;
mod service;
pub mod stats;
pub mod traits;
mod unlock;
mod watchdog;

pub use config::ServiceConfig;
pub use discovery::{PolicyInputs, compute_discovery_parameters};
pub use error::{Result, ServiceError};
pub use event_loop::ServiceEvent;
pub use packages::{PackageRegistry, StaticPackageRegistry};
pub use prefs::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use reader::{ReaderModeOptions, ReaderModeSession};
pub use service::{NfcService, ServiceHandle, TagRemovalWatch};
pub use traits::{
    DispatchStatus, DispatchedTag, FeedbackCue, FeedbackSink, NoopWakeLock, NullDispatcher,
    NullFeedback, TagDispatcher, WakeLock,
};
pub use unlock::UnlockHandlerId;
