//! Service configuration.

use crate::Result;
use nearfield_core::{ScreenState, TechMask, constants};
use std::time::Duration;

/// Static configuration for the NFC service.
///
/// The timing fields default to the production values in
/// [`nearfield_core::constants`]; tests shrink them so watchdog and
/// debounce behavior can be exercised quickly.
///
/// # Examples
///
/// ```
/// use nearfield_service::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert!(config.hce_capable);
/// assert!(config.live_case_techs.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Whether the device supports host card emulation.
    pub hce_capable: bool,

    /// Whether the device is still in setup-wizard provisioning mode.
    /// Cleared at runtime through the service handle.
    pub in_provision_mode: bool,

    /// Technologies polled for accessory "live case" covers while the
    /// screen is locked. Empty mask means the feature is disabled.
    pub live_case_techs: TechMask,

    /// Screen state assumed until the platform reports one.
    pub initial_screen_state: ScreenState,

    /// Watchdog deadline for controller initialization.
    pub init_watchdog: Duration,

    /// Watchdog deadline for de-initialization and routing changes.
    pub routing_watchdog: Duration,

    /// Presence-check interval used when no reader-mode override exists.
    pub default_presence_check_delay: Duration,

    /// Upper bound accepted for a polling pause.
    pub max_polling_pause: Duration,

    /// Delay before retrying a routing application postponed because a tag
    /// was still connected.
    pub apply_routing_retry_delay: Duration,

    /// Interval between detection-counter flushes.
    pub stats_flush_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            hce_capable: true,
            in_provision_mode: false,
            live_case_techs: TechMask::NONE,
            initial_screen_state: ScreenState::OnUnlocked,
            init_watchdog: Duration::from_millis(constants::INIT_WATCHDOG_MS),
            routing_watchdog: Duration::from_millis(constants::ROUTING_WATCHDOG_MS),
            default_presence_check_delay: Duration::from_millis(
                constants::DEFAULT_PRESENCE_CHECK_DELAY_MS,
            ),
            max_polling_pause: Duration::from_millis(
                constants::MAX_POLLING_PAUSE_TIMEOUT_MS,
            ),
            apply_routing_retry_delay: Duration::from_millis(
                constants::APPLY_ROUTING_RETRY_TIMEOUT_MS,
            ),
            stats_flush_interval: Duration::from_millis(
                constants::STATS_FLUSH_INTERVAL_MS,
            ),
        }
    }
}

impl ServiceConfig {
    /// Set the live-case technology list from configuration names
    /// ("TypeA", "TypeB", "TypeF", "TypeV").
    ///
    /// # Errors
    /// Returns an error for unknown technology names.
    pub fn with_live_case_types<'a>(
        mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut mask = TechMask::NONE;
        for name in names {
            mask |= name.parse::<TechMask>()?;
        }
        self.live_case_techs = mask;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings_come_from_constants() {
        let config = ServiceConfig::default();
        assert_eq!(config.init_watchdog, Duration::from_secs(90));
        assert_eq!(config.routing_watchdog, Duration::from_secs(10));
        assert_eq!(
            config.default_presence_check_delay,
            Duration::from_millis(125)
        );
    }

    #[test]
    fn live_case_types_parse_into_mask() {
        let config = ServiceConfig::default()
            .with_live_case_types(["TypeA", "TypeV"])
            .unwrap();
        assert_eq!(
            config.live_case_techs,
            TechMask::NFC_A | TechMask::NFC_V
        );
    }

    #[test]
    fn live_case_types_reject_unknown_names() {
        assert!(
            ServiceConfig::default()
                .with_live_case_types(["TypeQ"])
                .is_err()
        );
    }
}
