//! Frame tick sources.
//!
//! The detection loop and the study session advance once per tick. A
//! tick carries the session time in milliseconds; the loop awaits the
//! next tick only after the previous frame was fully processed, so slow
//! frames delay the schedule instead of piling up.
//!
//! Pending deadlines are measured on the source's own time line, so a
//! replay driven by synthetic ticks never mixes in wall-clock time.

use std::collections::VecDeque;
use std::time::Duration;

use handguide_common::SessionClock;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of frame ticks.
#[async_trait::async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick. `None` when the source is exhausted.
    async fn next_tick(&mut self) -> Option<u64>;

    /// Current session time on this source's time line.
    fn now_ms(&self) -> u64;

    /// Real time to wait before `deadline_ms` is due, or `None` when the
    /// source's time only moves with its ticks.
    fn time_until(&self, deadline_ms: u64) -> Option<Duration>;
}

/// Real-time ticks at a fixed frame rate.
pub struct FrameTicker {
    interval: Interval,
    clock: SessionClock,
}

impl FrameTicker {
    pub fn new(fps: u32, clock: SessionClock) -> Self {
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, clock }
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }
}

#[async_trait::async_trait]
impl TickSource for FrameTicker {
    async fn next_tick(&mut self) -> Option<u64> {
        self.interval.tick().await;
        Some(self.clock.now_ms())
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn time_until(&self, deadline_ms: u64) -> Option<Duration> {
        Some(Duration::from_millis(
            deadline_ms.saturating_sub(self.clock.now_ms()),
        ))
    }
}

/// A fixed list of synthetic ticks.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTicks {
    ticks: VecDeque<u64>,
    last: Option<u64>,
}

impl ScriptedTicks {
    pub fn new(ticks: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
            last: None,
        }
    }

    /// `count` ticks `period_ms` apart, starting at `start_ms`.
    pub fn every(period_ms: u64, count: usize, start_ms: u64) -> Self {
        Self::new((0..count as u64).map(|i| start_ms + i * period_ms))
    }

    pub fn remaining(&self) -> usize {
        self.ticks.len()
    }
}

#[async_trait::async_trait]
impl TickSource for ScriptedTicks {
    async fn next_tick(&mut self) -> Option<u64> {
        let tick = self.ticks.pop_front()?;
        self.last = Some(tick);
        Some(tick)
    }

    /// The last emitted tick; `0` before the first.
    fn now_ms(&self) -> u64 {
        self.last.unwrap_or_default()
    }

    fn time_until(&self, _deadline_ms: u64) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_ticks_drain() {
        let mut ticks = ScriptedTicks::every(16, 3, 100);
        assert_eq!(ticks.next_tick().await, Some(100));
        assert_eq!(ticks.next_tick().await, Some(116));
        assert_eq!(ticks.next_tick().await, Some(132));
        assert_eq!(ticks.next_tick().await, None);
        assert_eq!(ticks.now_ms(), 132);
    }

    #[tokio::test]
    async fn test_scripted_time_moves_only_with_ticks() {
        let mut ticks = ScriptedTicks::new([40, 90]);
        assert_eq!(ticks.now_ms(), 0);
        ticks.next_tick().await;
        assert_eq!(ticks.now_ms(), 40);
        assert_eq!(ticks.time_until(50), None);
    }

    #[tokio::test]
    async fn test_frame_ticker_waits_on_session_clock() {
        let ticker = FrameTicker::new(60, SessionClock::start());
        let now = ticker.now_ms();
        assert!(ticker.time_until(now + 10_000).unwrap() > Duration::from_secs(9));
        assert_eq!(ticker.time_until(0), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_frame_ticker_is_monotonic() {
        let mut ticker = FrameTicker::new(200, SessionClock::start());
        let a = ticker.next_tick().await.unwrap();
        let b = ticker.next_tick().await.unwrap();
        assert!(b >= a);
    }
}
