//! Discovery parameter value object.
//!
//! [`DiscoveryParameters`] captures everything the controller needs to
//! configure its polling/listening loop: the technology poll mask, peer
//! mode, low-power discovery, host card-emulation routing, and reader
//! mode. A fresh value is computed on every policy evaluation and compared
//! structurally against the currently applied value so the hardware is only
//! reconfigured when something actually changed.

use crate::types::TechMask;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable snapshot of the controller discovery configuration.
///
/// Build with [`DiscoveryParameters::builder`]; the default value (also
/// available as [`DiscoveryParameters::nfc_off`]) polls nothing and routes
/// nothing, which is what the controller should be doing while the adapter
/// is off.
///
/// # Examples
///
/// ```
/// use nearfield_core::{DiscoveryParameters, TechMask};
///
/// let params = DiscoveryParameters::builder()
///     .tech_mask(TechMask::DEFAULT_POLL)
///     .enable_p2p(true)
///     .build();
///
/// assert!(params.should_enable_discovery());
/// assert_ne!(params, DiscoveryParameters::nfc_off());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryParameters {
    tech_mask: TechMask,
    enable_p2p: bool,
    enable_low_power_discovery: bool,
    enable_host_routing: bool,
    enable_reader_mode: bool,
}

impl DiscoveryParameters {
    /// Start building a parameter set.
    #[must_use]
    pub fn builder() -> DiscoveryParametersBuilder {
        DiscoveryParametersBuilder::default()
    }

    /// The resting configuration: no polling, no routing, no peer mode.
    #[must_use]
    pub fn nfc_off() -> Self {
        DiscoveryParameters {
            tech_mask: TechMask::NONE,
            enable_p2p: false,
            enable_low_power_discovery: true,
            enable_host_routing: false,
            enable_reader_mode: false,
        }
    }

    /// Technologies to poll for.
    #[must_use]
    pub fn tech_mask(&self) -> TechMask {
        self.tech_mask
    }

    /// Whether peer-to-peer discovery is enabled.
    #[must_use]
    pub fn p2p_enabled(&self) -> bool {
        self.enable_p2p
    }

    /// Whether the controller may use its low-power discovery mode.
    #[must_use]
    pub fn low_power_discovery_enabled(&self) -> bool {
        self.enable_low_power_discovery
    }

    /// Whether host card-emulation routing is enabled.
    #[must_use]
    pub fn host_routing_enabled(&self) -> bool {
        self.enable_host_routing
    }

    /// Whether an exclusive reader-mode registration drives this
    /// configuration.
    #[must_use]
    pub fn reader_mode_enabled(&self) -> bool {
        self.enable_reader_mode
    }

    /// Whether this configuration requires the discovery loop to run at
    /// all. Listening for host routing counts even with an empty poll
    /// mask.
    #[must_use]
    pub fn should_enable_discovery(&self) -> bool {
        !self.tech_mask.is_empty() || self.enable_host_routing
    }
}

impl Default for DiscoveryParameters {
    fn default() -> Self {
        Self::nfc_off()
    }
}

impl fmt::Display for DiscoveryParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "poll={} p2p={} low_power={} host_routing={} reader_mode={}",
            self.tech_mask,
            self.enable_p2p,
            self.enable_low_power_discovery,
            self.enable_host_routing,
            self.enable_reader_mode
        )
    }
}

/// Builder for [`DiscoveryParameters`].
#[derive(Debug, Clone)]
pub struct DiscoveryParametersBuilder {
    params: DiscoveryParameters,
}

impl Default for DiscoveryParametersBuilder {
    fn default() -> Self {
        DiscoveryParametersBuilder {
            params: DiscoveryParameters::nfc_off(),
        }
    }
}

impl DiscoveryParametersBuilder {
    /// Set the technology poll mask.
    #[must_use]
    pub fn tech_mask(mut self, mask: TechMask) -> Self {
        self.params.tech_mask = mask;
        self
    }

    /// Enable or disable peer-to-peer discovery.
    #[must_use]
    pub fn enable_p2p(mut self, enabled: bool) -> Self {
        self.params.enable_p2p = enabled;
        self
    }

    /// Enable or disable low-power discovery.
    #[must_use]
    pub fn enable_low_power_discovery(mut self, enabled: bool) -> Self {
        self.params.enable_low_power_discovery = enabled;
        self
    }

    /// Enable or disable host card-emulation routing.
    #[must_use]
    pub fn enable_host_routing(mut self, enabled: bool) -> Self {
        self.params.enable_host_routing = enabled;
        self
    }

    /// Mark the configuration as driven by a reader-mode registration.
    #[must_use]
    pub fn enable_reader_mode(mut self, enabled: bool) -> Self {
        self.params.enable_reader_mode = enabled;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> DiscoveryParameters {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_parameters_disable_discovery() {
        let off = DiscoveryParameters::nfc_off();
        assert!(!off.should_enable_discovery());
        assert!(off.low_power_discovery_enabled());
        assert_eq!(off, DiscoveryParameters::default());
    }

    #[test]
    fn polling_enables_discovery() {
        let params = DiscoveryParameters::builder()
            .tech_mask(TechMask::NFC_A)
            .build();
        assert!(params.should_enable_discovery());
    }

    #[test]
    fn host_routing_alone_enables_discovery() {
        let params = DiscoveryParameters::builder()
            .enable_host_routing(true)
            .build();
        assert!(params.tech_mask().is_empty());
        assert!(params.should_enable_discovery());
    }

    #[test]
    fn equality_is_structural() {
        let a = DiscoveryParameters::builder()
            .tech_mask(TechMask::DEFAULT_POLL)
            .enable_p2p(true)
            .enable_host_routing(true)
            .build();
        let b = DiscoveryParameters::builder()
            .tech_mask(TechMask::DEFAULT_POLL)
            .enable_p2p(true)
            .enable_host_routing(true)
            .build();
        assert_eq!(a, b);

        let c = DiscoveryParametersBuilder::default()
            .tech_mask(TechMask::DEFAULT_POLL)
            .build();
        assert_ne!(a, c);
    }

    #[test]
    fn display_lists_fields() {
        let params = DiscoveryParameters::builder()
            .tech_mask(TechMask::NFC_A)
            .enable_reader_mode(true)
            .build();
        let rendered = params.to_string();
        assert!(rendered.contains("poll=A"));
        assert!(rendered.contains("reader_mode=true"));
    }
}
