//! Watchdog for controller calls that can hang.
//!
//! The controller occasionally wedges inside `initialize`, `deinitialize`
//! or a routing change. Every such call is bracketed by a [`Watchdog`]:
//! a timer on its own task that, if not disarmed before the deadline,
//! forcibly aborts the controller link. Running on a separate task is the
//! point: the abort must go through while the guarded call is still
//! blocked, so the watchdog can never share that call's execution context.
//!
//! Disarming is idempotent and also happens on drop, so the normal
//! completion path cannot leak a pending abort.

use nearfield_hal::{AnyDeviceHost, DeviceHost};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// A one-shot abort timer guarding a single controller call.
#[derive(Debug)]
pub(crate) struct Watchdog {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Watchdog {
    /// Arm a watchdog that aborts the controller after `timeout` unless
    /// disarmed first. `operation` names the guarded call in the abort
    /// reason and the log.
    pub(crate) fn arm(
        host: Arc<AnyDeviceHost>,
        operation: &'static str,
        timeout: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let guard_token = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = guard_token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    error!(operation, timeout_ms = timeout.as_millis() as u64,
                        "watchdog expired, aborting controller");
                    host.abort(operation).await;
                }
            }
        });
        Watchdog { token, task }
    }

    /// Disarm the watchdog: the guarded call completed in time.
    pub(crate) fn disarm(self) {
        self.token.cancel();
    }

    /// Whether the timer task has finished (test hook).
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
