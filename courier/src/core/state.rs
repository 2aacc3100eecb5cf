//! In-memory bookkeeping owned by the run loop.

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Retryable contract failures seen so far. Survives successful cycles
    /// unless the loop is configured to reset it.
    pub consecutive_contract_errors: u32,
    /// Transfers accepted by the node in the current cycle.
    pub transfers_succeeded: u32,
    /// Transfers rejected in the current cycle.
    pub transfers_failed: u32,
    /// Earliest time the next cycle may start; `None` means now.
    pub next_scan_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Clear per-cycle counters.
    pub fn reset_before_scan(&mut self) {
        self.transfers_succeeded = 0;
        self.transfers_failed = 0;
    }

    pub fn schedule_next_scan(&mut self, now: DateTime<Utc>, after: TimeDelta) {
        self.next_scan_at = Some(now.checked_add_signed(after).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    /// Time left until the next scan is due, zero if it already is.
    pub fn wait_before_scan(&self, now: DateTime<Utc>) -> TimeDelta {
        match self.next_scan_at {
            Some(at) if at > now => at - now,
            _ => TimeDelta::zero(),
        }
    }
}
