//! Staleness detection for an open connection.
//!
//! Any inbound frame (data or heartbeat) counts as liveness. When nothing
//! arrives for the configured threshold the connection is considered dead,
//! even if the socket never reported an error.

use std::time::Duration;
use tokio::time::{Instant, Sleep};

pub struct StalenessWatchdog {
    threshold: Duration,
    last_frame: Instant,
}

impl StalenessWatchdog {
    /// Starts armed: the first frame must arrive within `threshold`.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_frame: Instant::now(),
        }
    }

    pub fn record_frame(&mut self) {
        self.last_frame = Instant::now();
    }

    pub fn deadline(&self) -> Instant {
        self.last_frame + self.threshold
    }

    /// Resolves at the current deadline. Re-create after each frame.
    pub fn expired(&self) -> Sleep {
        tokio::time::sleep_until(self.deadline())
    }
}
