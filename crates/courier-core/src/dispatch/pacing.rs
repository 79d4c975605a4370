//! Two-tier pacing policy for batch sends.
//!
//! A flat per-message delay alone does not look like a human sender;
//! operators layer a longer "every N messages, rest" pause on top to mimic
//! burst-then-rest sending and stay under provider throttling heuristics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays applied between consecutive targets of a dispatch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PacingPolicy {
    /// Seconds to wait after every message.
    pub per_message_delay_seconds: u64,

    /// Group size for the secondary pause; 0 disables it.
    pub every_n_delay_count: u64,

    /// Extra seconds to wait after each full group.
    pub group_delay_seconds: u64,
}

impl PacingPolicy {
    /// Total suspension after processing the target at `index` out of
    /// `total`.
    ///
    /// Zero after the final target. Both tiers stack when the group
    /// boundary lines up with a per-message delay.
    pub fn pause_after(&self, index: usize, total: usize) -> Duration {
        if index + 1 >= total {
            return Duration::ZERO;
        }

        let mut secs = self.per_message_delay_seconds;
        if self.every_n_delay_count > 0
            && self.group_delay_seconds > 0
            && (index as u64 + 1) % self.every_n_delay_count == 0
        {
            secs += self.group_delay_seconds;
        }
        Duration::from_secs(secs)
    }
}
