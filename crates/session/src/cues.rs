//! Audible milestone cues.

use std::io::Write;

use handguide_processing_core::{Cue, Milestone};

/// Receives one cue per progression milestone.
pub trait CueSink: Send {
    fn play(&mut self, cue: Cue, milestone: Milestone);
}

/// Logs each cue and rings the terminal bell.
#[derive(Debug, Default)]
pub struct LogCueSink {
    bell: bool,
}

impl LogCueSink {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

impl CueSink for LogCueSink {
    fn play(&mut self, cue: Cue, milestone: Milestone) {
        tracing::info!(?cue, ?milestone, "Milestone cue");
        if self.bell {
            // A beep is two bells.
            let bells: &[u8] = match cue {
                Cue::Click => b"\x07",
                Cue::Beep => b"\x07\x07",
            };
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(bells).and_then(|_| stderr.flush());
        }
    }
}

/// Drops every cue.
#[derive(Debug, Default)]
pub struct SilentCueSink;

impl CueSink for SilentCueSink {
    fn play(&mut self, _cue: Cue, _milestone: Milestone) {}
}
