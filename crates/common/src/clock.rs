//! Session clock.
//!
//! Every timestamp inside a session is a monotonic millisecond count
//! relative to the session epoch. Data rows additionally carry wall-clock
//! time, derived from the wall time captured at the epoch.

use std::time::Instant;

/// A monotonic clock anchored at session start.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (ms since the Unix epoch).
    epoch_unix_ms: i64,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_unix_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a clock from a known wall-clock anchor (replays and tests).
    pub fn from_unix_ms(epoch_unix_ms: i64) -> Self {
        Self {
            epoch: Instant::now(),
            epoch_unix_ms,
        }
    }

    /// Milliseconds elapsed since the epoch.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Wall-clock time of a session timestamp.
    pub fn unix_ms_at(&self, session_ms: u64) -> i64 {
        self.epoch_unix_ms + session_ms as i64
    }

    pub fn epoch_unix_ms(&self) -> i64 {
        self.epoch_unix_ms
    }

    /// Wall-clock time at epoch as RFC 3339.
    pub fn epoch_rfc3339(&self) -> String {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(self.epoch_unix_ms)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }

    /// Convert milliseconds to seconds.
    pub fn ms_to_secs(ms: u64) -> f64 {
        ms as f64 / 1000.0
    }
}
