//! Mock controller implementations for testing and development.
//!
//! [`MockDeviceHost`] simulates the radio controller: lifecycle behavior is
//! scripted through a [`MockHostController`] handle, every control-plane
//! call is recorded for assertions, and tag presentations flow through the
//! same event channel a real controller would use. [`MockTagEndpoint`]
//! simulates a single tag session with scriptable NDEF content and
//! failure injection.

mod host;
mod tag;

pub use host::{CallBehavior, HostCall, MockDeviceHost, MockHostController};
pub use tag::MockTagEndpoint;
