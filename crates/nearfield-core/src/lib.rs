//! Shared domain types for the Nearfield NFC controller service.
//!
//! This crate defines the vocabulary used across the hardware abstraction
//! and the service core: adapter lifecycle states, polling technology
//! masks, screen states, discovery parameters, and the small newtypes that
//! travel between them (tag handles, UIDs, NDEF payloads).

pub mod constants;
pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{DiscoveryParameters, DiscoveryParametersBuilder};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
