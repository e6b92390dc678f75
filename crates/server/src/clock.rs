// Process clock
//
// Captured once when the service becomes ready. Uptime is derived from the
// monotonic instant, the wall-clock timestamp is kept only for display.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct ProcessClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProcessClock {
    /// Record the start instant. Call exactly once per process.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Time elapsed since start, computed on every call
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
