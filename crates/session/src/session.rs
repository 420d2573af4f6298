//! Per-frame study pipeline.
//!
//! For each detected frame the session picks the wrist of the task's
//! hand, maps it into millimeters, runs the progression engine, forwards
//! the directional feedback to the wearable, logs engaged frames, and
//! plays milestone cues. Configuration is re-read from the config store
//! whenever it changes, so calibration edits apply on the next frame.

use std::path::Path;

use handguide_common::error::{HandguideError, HandguideResult};
use handguide_common::{AppConfig, SessionClock};
use handguide_processing_core::{Advance, CoordinateMapper, FrameOutcome, ProgressPhase, TaskProgression};
use handguide_serial::{DirectionCommand, SerialLink};
use handguide_study_model::{FrameDetections, MmPosition, Task};
use tokio::sync::watch;

use crate::cues::{CueSink, LogCueSink};
use crate::datalog::{DataLog, FrameContext};
use crate::export::{export_bundle, ExportBundle};

pub struct StudySession {
    participant_id: String,
    progression: TaskProgression,
    config: AppConfig,
    config_rx: Option<watch::Receiver<AppConfig>>,
    mapper: CoordinateMapper,
    clock: SessionClock,
    log: DataLog,
    serial: Option<SerialLink>,
    cues: Box<dyn CueSink>,
    frames: u64,
    advances: u64,
}

impl StudySession {
    /// Start a session over `tasks`. Fails on an empty or invalid list, or
    /// a blank participant id.
    pub fn new(
        participant_id: impl Into<String>,
        tasks: Vec<Task>,
        config: AppConfig,
        clock: SessionClock,
    ) -> HandguideResult<Self> {
        let participant_id = participant_id.into();
        if participant_id.trim().is_empty() {
            return Err(HandguideError::session("participant id is empty"));
        }
        let progression = TaskProgression::with_tasks(tasks, config.progression.hold_exit)?;
        tracing::info!(
            participant = %participant_id,
            tasks = progression.tasks().len(),
            started = %clock.epoch_rfc3339(),
            "Study session started"
        );
        Ok(Self {
            participant_id,
            progression,
            mapper: CoordinateMapper::new(config.calibration, &config.testbed),
            config,
            config_rx: None,
            clock,
            log: DataLog::new(),
            serial: None,
            cues: Box::new(LogCueSink::default()),
            frames: 0,
            advances: 0,
        })
    }

    /// Follow a config store. The current value applies immediately.
    pub fn watch_config(mut self, mut rx: watch::Receiver<AppConfig>) -> Self {
        let config = rx.borrow_and_update().clone();
        self.apply_config(config);
        self.config_rx = Some(rx);
        self
    }

    pub fn with_serial(mut self, link: SerialLink) -> Self {
        self.serial = Some(link);
        self
    }

    pub fn with_cues(mut self, cues: Box<dyn CueSink>) -> Self {
        self.cues = cues;
        self
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn progression(&self) -> &TaskProgression {
        &self.progression
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn log(&self) -> &DataLog {
        &self.log
    }

    pub fn serial(&self) -> Option<&SerialLink> {
        self.serial.as_ref()
    }

    pub fn take_serial(&mut self) -> Option<SerialLink> {
        self.serial.take()
    }

    /// Detected frames processed.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Progression advances so far.
    pub fn advances(&self) -> u64 {
        self.advances
    }

    pub fn is_complete(&self) -> bool {
        self.progression.phase() == ProgressPhase::TaskComplete
    }

    /// Pick up a config change published since the last call.
    pub fn refresh_config(&mut self) -> Option<AppConfig> {
        let rx = self.config_rx.as_mut()?;
        if !rx.has_changed().unwrap_or(false) {
            return None;
        }
        let config = rx.borrow_and_update().clone();
        tracing::debug!("Session picked up config change");
        self.apply_config(config.clone());
        Some(config)
    }

    fn apply_config(&mut self, config: AppConfig) {
        self.mapper = CoordinateMapper::new(config.calibration, &config.testbed);
        self.progression.set_hold_exit(config.progression.hold_exit);
        self.config = config;
    }

    /// Active hand in mm, from the wrist of the current task's hand.
    pub fn active_hand(&self, detections: &FrameDetections) -> Option<MmPosition> {
        let task = self.progression.current_task()?;
        let wrist = (*detections.wrists.as_ref()?.get(task.hand))?;
        Some(self.mapper.device_to_mm(&wrist))
    }

    /// Run one detected frame through the pipeline.
    pub fn process_frame(&mut self, detections: &FrameDetections, now_ms: u64) -> FrameOutcome {
        self.refresh_config();
        self.frames += 1;
        let hand = self.active_hand(detections);
        let was_complete = self.is_complete();
        let feedback_config = self.config.feedback;
        let outcome = self.progression.process_frame(hand, now_ms, &feedback_config);

        if let Some(engaged) = &outcome.engaged {
            if let Some(task) = self.progression.tasks().get(engaged.state.current_task_index) {
                let frame = FrameContext {
                    participant_id: &self.participant_id,
                    unix_timestamp: self.clock.unix_ms_at(now_ms),
                    world_ppi: self.config.calibration.world_ppi,
                    px_per_mm: self.mapper.px_per_mm(),
                    imu: self
                        .serial
                        .as_ref()
                        .filter(|link| link.is_connected())
                        .map(|link| link.latest_imu().map(|r| r.as_tuple())),
                };
                self.log.record(task, engaged, &frame);
            }
        }

        if let Some(feedback) = outcome.feedback {
            self.send_command(DirectionCommand::from(feedback));
        }

        for advance in &outcome.advances {
            self.on_advance(advance);
        }
        if !was_complete && self.is_complete() {
            self.send_command(DirectionCommand::default());
        }
        outcome
    }

    /// Fire a HOLD completion that came due between frames.
    pub fn fire_due_hold(&mut self, now_ms: u64) -> Option<Advance> {
        let advance = self.progression.poll_hold(now_ms)?;
        self.on_advance(&advance);
        if advance.study_complete {
            self.send_command(DirectionCommand::default());
        }
        Some(advance)
    }

    fn on_advance(&mut self, advance: &Advance) {
        self.advances += 1;
        tracing::debug!(
            milestone = ?advance.milestone,
            task = advance.state.current_task_index,
            trial = advance.state.current_trial,
            repetition = advance.state.current_repetition,
            target = advance.state.current_target,
            "Progression advanced"
        );
        self.cues.play(advance.cue, advance.milestone);
    }

    fn send_command(&self, command: DirectionCommand) {
        let Some(link) = self.serial.as_ref().filter(|link| link.is_connected()) else {
            return;
        };
        if let Err(e) = link.send_command(command) {
            tracing::warn!(error = %e, "Direction command not sent");
        }
    }

    /// Write the export bundle under `parent`, or under the configured
    /// data directory.
    pub fn export(&self, parent: Option<&Path>) -> HandguideResult<ExportBundle> {
        let parent = parent.unwrap_or(&self.config.data_dir);
        export_bundle(parent, &self.participant_id, &self.log, self.progression.tasks())
    }
}

impl std::fmt::Debug for StudySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudySession")
            .field("participant_id", &self.participant_id)
            .field("phase", &self.progression.phase())
            .field("state", self.progression.state())
            .field("frames", &self.frames)
            .field("samples", &self.log.len())
            .finish()
    }
}
