//! Timing and sizing constants for the controller service.
//!
//! These values govern how long the service waits on the controller before
//! declaring it wedged, how aggressively tags are presence-checked, and how
//! deep the internal queues are. The watchdog timeouts in particular are
//! load-bearing: the controller performs a firmware download as part of
//! initialization on some chipsets, so the initialize timeout is far larger
//! than the de-initialize one.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use nearfield_core::constants::INIT_WATCHDOG_MS;
//!
//! let timeout = Duration::from_millis(INIT_WATCHDOG_MS);
//! assert_eq!(timeout.as_secs(), 90);
//! ```

// ============================================================================
// Watchdog timeouts
// ============================================================================

/// Time to wait for controller initialization before the watchdog fires.
///
/// Chosen large because a firmware download may be part of initialization.
pub const INIT_WATCHDOG_MS: u64 = 90_000;

/// Time to wait for de-initialization or a routing change before the
/// watchdog fires.
pub const ROUTING_WATCHDOG_MS: u64 = 10_000;

// ============================================================================
// Tag presence and debounce
// ============================================================================

/// Default interval between tag presence checks, in milliseconds.
///
/// Reader-mode callers may override this per registration.
pub const DEFAULT_PRESENCE_CHECK_DELAY_MS: u64 = 125;

// ============================================================================
// Polling pause
// ============================================================================

/// Upper bound accepted for a polling pause request, in milliseconds.
///
/// Requests above this (or non-positive requests) are rejected so a caller
/// cannot silence the controller indefinitely.
pub const MAX_POLLING_PAUSE_TIMEOUT_MS: u64 = 40_000;

// ============================================================================
// Routing reapplication
// ============================================================================

/// Delay before retrying a discovery reconfiguration that was postponed
/// because a tag was still physically connected during an unlock
/// transition.
pub const APPLY_ROUTING_RETRY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Telemetry
// ============================================================================

/// Interval between detection-counter flushes to the log.
pub const STATS_FLUSH_INTERVAL_MS: u64 = 4 * 60 * 60 * 1000;

// ============================================================================
// Queue depths
// ============================================================================

/// Capacity of the serialized enable/disable worker queue.
///
/// Lifecycle requests beyond this apply backpressure to the submitter
/// rather than being dropped.
pub const LIFECYCLE_QUEUE_DEPTH: usize = 16;

/// Capacity of the hardware event channel between the device host and the
/// event loop.
pub const HOST_EVENT_QUEUE_DEPTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_watchdog_dwarfs_routing_watchdog() {
        // Initialization covers firmware download; de-init must not.
        assert!(INIT_WATCHDOG_MS > 5 * ROUTING_WATCHDOG_MS);
    }

    #[test]
    fn pause_bound_is_positive() {
        assert!(MAX_POLLING_PAUSE_TIMEOUT_MS > 0);
    }
}
