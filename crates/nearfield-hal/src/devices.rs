//! Enum wrappers for controller and tag dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) are not object-safe,
//! so the controller cannot be held as `Box<dyn DeviceHost>` and discovered
//! tags cannot be stored as `Box<dyn TagEndpoint>`. This module provides
//! enum wrappers with concrete type dispatch instead, keeping the service
//! monomorphic and the handle table downcast-free.

use crate::Result;
use crate::mock::{MockDeviceHost, MockTagEndpoint};
use crate::traits::{DeviceHost, TagEndpoint};
use bytes::Bytes;
use nearfield_core::{DiscoveryParameters, NdefMessage, TagHandle, TagUid, TechMask};

/// Enum wrapper for controller dispatch.
///
/// The service and its watchdog tasks hold the controller behind an `Arc`
/// of this wrapper.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyDeviceHost {
    /// Mock controller for development and testing.
    Mock(MockDeviceHost),
    // Planned variants once a native transport lands:
    // - Nci(NciDeviceHost) behind the hardware-nci feature
}

impl DeviceHost for AnyDeviceHost {
    async fn initialize(&self) -> Result<bool> {
        match self {
            Self::Mock(host) => host.initialize().await,
        }
    }

    async fn deinitialize(&self) -> Result<bool> {
        match self {
            Self::Mock(host) => host.deinitialize().await,
        }
    }

    async fn enable_discovery(
        &self,
        params: &DiscoveryParameters,
        restart: bool,
    ) -> Result<()> {
        match self {
            Self::Mock(host) => host.enable_discovery(params, restart).await,
        }
    }

    async fn disable_discovery(&self) -> Result<()> {
        match self {
            Self::Mock(host) => host.disable_discovery().await,
        }
    }

    async fn commit_routing(&self) -> Result<()> {
        match self {
            Self::Mock(host) => host.commit_routing().await,
        }
    }

    async fn route_aid(&self, aid: Bytes, route: u32, aid_info: u32) -> Result<()> {
        match self {
            Self::Mock(host) => host.route_aid(aid, route, aid_info).await,
        }
    }

    async fn unroute_aid(&self, aid: Bytes) -> Result<()> {
        match self {
            Self::Mock(host) => host.unroute_aid(aid).await,
        }
    }

    async fn abort(&self, reason: &str) {
        match self {
            Self::Mock(host) => host.abort(reason).await,
        }
    }

    async fn factory_reset(&self) -> Result<()> {
        match self {
            Self::Mock(host) => host.factory_reset().await,
        }
    }

    async fn check_firmware(&self) -> Result<()> {
        match self {
            Self::Mock(host) => host.check_firmware().await,
        }
    }
}

/// Enum wrapper for tag endpoint dispatch.
///
/// Clones refer to the same tag session.
///
/// # Examples
///
/// ```
/// use nearfield_hal::AnyTagEndpoint;
/// use nearfield_hal::mock::MockTagEndpoint;
/// use nearfield_hal::traits::TagEndpoint;
/// use nearfield_core::{TagHandle, TagUid};
///
/// let tag = MockTagEndpoint::new(
///     TagHandle::new(1),
///     TagUid::new(vec![0x04, 0xAB]).unwrap(),
/// );
/// let any_tag = AnyTagEndpoint::Mock(tag);
/// assert_eq!(any_tag.handle(), TagHandle::new(1));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyTagEndpoint {
    /// Mock tag for development and testing.
    Mock(MockTagEndpoint),
    // Planned variants once a native transport lands:
    // - Nci(NciTagEndpoint) behind the hardware-nci feature
}

impl TagEndpoint for AnyTagEndpoint {
    fn handle(&self) -> TagHandle {
        match self {
            Self::Mock(tag) => tag.handle(),
        }
    }

    fn uid(&self) -> TagUid {
        match self {
            Self::Mock(tag) => tag.uid(),
        }
    }

    fn technologies(&self) -> TechMask {
        match self {
            Self::Mock(tag) => tag.technologies(),
        }
    }

    fn connected_technology(&self) -> TechMask {
        match self {
            Self::Mock(tag) => tag.connected_technology(),
        }
    }

    async fn read_ndef(&self) -> Result<Option<NdefMessage>> {
        match self {
            Self::Mock(tag) => tag.read_ndef().await,
        }
    }

    async fn reconnect(&self) -> Result<()> {
        match self {
            Self::Mock(tag) => tag.reconnect().await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            Self::Mock(tag) => tag.disconnect().await,
        }
    }

    async fn is_present(&self) -> bool {
        match self {
            Self::Mock(tag) => tag.is_present().await,
        }
    }
}
