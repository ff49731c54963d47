//! Cleanup Loop — periodic expiry of grants. Tasks persist indefinitely
//! under the task-FSM model (no pending-approval deadline), so grant
//! expiry is the only sweep the task model calls for. Failures are
//! logged and swallowed; the loop never stops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::approval::ApprovalChannel;

pub struct CleanupLoop {
    approval: Arc<ApprovalChannel>,
    interval: Duration,
}

impl CleanupLoop {
    pub fn new(approval: Arc<ApprovalChannel>, interval: Duration) -> Self {
        Self { approval, interval }
    }

    /// Run forever, ticking every `interval`. Intended to be
    /// `tokio::spawn`ed from `main.rs`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.sweep();
        }
    }

    /// One sweep: remove expired grants. Exposed separately from
    /// [`run`](Self::run) so tests can drive it without waiting on a
    /// timer.
    pub fn sweep(&self) {
        match self.approval.remove_expired_grants() {
            Ok(removed) if removed > 0 => {
                tracing::info!(removed, "cleanup: expired grants removed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "cleanup: failed to sweep expired grants");
            }
        }
    }
}
