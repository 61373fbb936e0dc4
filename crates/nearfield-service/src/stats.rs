//! Detection counters.
//!
//! The service counts tag arrivals, host card-emulation sessions, and
//! off-host transactions, and flushes the counts to the log on a long
//! interval. The counters live on the event loop, so plain integers are
//! enough.

use tracing::info;

/// Counters flushed periodically to the telemetry log.
#[derive(Debug, Default)]
pub struct DetectionCounters {
    tags: u32,
    p2p: u32,
    hce: u32,
    transactions: u32,
}

impl DetectionCounters {
    pub fn record_tag(&mut self) {
        self.tags += 1;
    }

    pub fn record_p2p(&mut self) {
        self.p2p += 1;
    }

    pub fn record_hce(&mut self) {
        self.hce += 1;
    }

    pub fn record_transaction(&mut self) {
        self.transactions += 1;
    }

    /// Number of tags detected since the last flush.
    #[must_use]
    pub fn tags(&self) -> u32 {
        self.tags
    }

    /// Log non-zero counters and reset them.
    pub fn flush(&mut self) {
        if self.tags == 0 && self.p2p == 0 && self.hce == 0 && self.transactions == 0 {
            return;
        }
        info!(
            tags = self.tags,
            p2p = self.p2p,
            hce = self.hce,
            transactions = self.transactions,
            "detection counters"
        );
        *self = DetectionCounters::default();
    }
}
