//! Hardware abstraction for the Nearfield NFC controller service.
//!
//! This crate defines the contract between the service core and the radio
//! controller: the [`DeviceHost`] control-plane trait, the [`TagEndpoint`]
//! trait for discovered tags, and the [`HostEvent`] stream through which
//! the controller reports asynchronous activity (tag arrivals, RF field
//! changes, card-emulation traffic).
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), so trait objects are not available; the [`devices`] module
//! provides enum wrappers for heterogeneous dispatch, and mock
//! implementations for development and testing live under [`mock`].
//!
//! A host implementation is constructed with the sending half of the event
//! channel; the service owns the receiving half. There is no global
//! service instance to call back into.

pub mod devices;
pub mod error;
pub mod events;
pub mod mock;
pub mod traits;

pub use devices::{AnyDeviceHost, AnyTagEndpoint};
pub use error::{HardwareError, Result};
pub use events::{HostEvent, HostEventReceiver, HostEventSender, host_event_channel};
pub use traits::{DeviceHost, TagEndpoint};
