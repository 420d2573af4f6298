//! Study loop.
//!
//! One loop drives both the detector adapter and the session, so the
//! detection results and the progression state are never written from
//! two places. Between ticks the loop also wakes for a pending HOLD
//! deadline, which lets a hold complete on time even when frames stall.
//! Deadlines are read against the tick source's time line; sources whose
//! time moves only with ticks complete holds on the frame that reaches
//! the deadline.

use std::time::Duration;

use handguide_detection::{AdapterStats, LandmarkAdapter, TickOutcome, TickSource};
use serde::Serialize;

use crate::session::StudySession;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// Every task finished.
    Complete,
    /// The video stream ended first.
    VideoEnded,
    /// The tick source ran dry first.
    TicksExhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub end: RunEnd,
    pub ticks: u64,
    pub frames: u64,
    pub advances: u64,
    pub samples: usize,
    pub failures: u64,
    #[serde(skip)]
    pub adapter: AdapterStats,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.end == RunEnd::Complete
    }
}

async fn hold_timer(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

/// Run until the study completes, the video ends, or `ticks` runs dry.
pub async fn run_study<T: TickSource + ?Sized>(
    adapter: &mut LandmarkAdapter,
    session: &mut StudySession,
    ticks: &mut T,
) -> RunSummary {
    let mut tick_count = 0u64;

    let end = loop {
        if session.is_complete() {
            break RunEnd::Complete;
        }

        let wait = session
            .progression()
            .next_deadline()
            .and_then(|(deadline, _)| ticks.time_until(deadline));

        let now_ms = tokio::select! {
            biased;
            tick = ticks.next_tick() => match tick {
                Some(now_ms) => now_ms,
                None => break RunEnd::TicksExhausted,
            },
            _ = hold_timer(wait) => {
                session.fire_due_hold(ticks.now_ms());
                continue;
            }
        };
        tick_count += 1;

        if let Some(config) = session.refresh_config() {
            adapter.update_calibration(config.calibration, &config.testbed);
            adapter.update_config(config.detection);
        }

        match adapter.tick() {
            Ok(TickOutcome::Detected(detections)) => {
                session.process_frame(&detections, now_ms);
            }
            Ok(TickOutcome::Ended) => break RunEnd::VideoEnded,
            Ok(_) | Err(_) => {
                session.fire_due_hold(now_ms);
            }
        }
    };

    let adapter_stats = adapter.stats();
    let summary = RunSummary {
        end,
        ticks: tick_count,
        frames: session.frames(),
        advances: session.advances(),
        samples: session.log().len(),
        failures: adapter_stats.failures,
        adapter: adapter_stats,
    };
    tracing::info!(
        end = ?summary.end,
        ticks = summary.ticks,
        frames = summary.frames,
        advances = summary.advances,
        samples = summary.samples,
        "Study run finished"
    );
    summary
}
