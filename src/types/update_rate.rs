//! Update rate control for packet subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for a packet subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every packet, as fast as the device sends them
    Native,

    /// At most this many packets per second (latest wins)
    /// `Max(0)` is treated as Native
    Max(u32),
}

impl UpdateRate {
    /// Normalize degenerate rates
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            other => other,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
