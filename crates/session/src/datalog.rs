//! In-memory log of engaged frames.

use handguide_common::SessionClock;
use handguide_processing_core::EngagedFrame;
use handguide_study_model::{ImuSample, MmSample, PxSample, SampleContext, Task};

/// Samples of one study, one row per engaged frame and table.
#[derive(Debug, Clone, Default)]
pub struct DataLog {
    mm: Vec<MmSample>,
    px: Vec<PxSample>,
    imu: Vec<ImuSample>,
}

/// Per-frame values that come from outside the progression engine.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub participant_id: &'a str,
    pub unix_timestamp: i64,
    pub world_ppi: f64,
    pub px_per_mm: f64,
    /// `Some` while the serial link is connected; the inner value is the
    /// latest IMU reading, if any.
    pub imu: Option<Option<(f32, f32, f32)>>,
}

impl DataLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the rows for one engaged frame.
    pub fn record(&mut self, task: &Task, engaged: &EngagedFrame, frame: &FrameContext<'_>) {
        let ctx = SampleContext {
            unix_timestamp: frame.unix_timestamp,
            time_sec: SessionClock::ms_to_secs(engaged.elapsed_ms),
            participant_id: frame.participant_id.to_string(),
            task_tag: task.tag.clone(),
            task_type: task.kind,
            user_hand: task.hand,
            task_idx: engaged.state.current_task_index,
            trial_idx: engaged.state.current_trial,
            repetition_idx: engaged.state.current_repetition,
            target_idx: engaged.state.current_target,
        };

        let mm = ctx.mm_sample(
            (engaged.target_mm.x, engaged.target_mm.y),
            task.distance_threshold,
            (engaged.hand_mm.x, engaged.hand_mm.y),
            engaged.distance_mm,
        );
        self.px.push(ctx.px_sample(&mm, frame.world_ppi, frame.px_per_mm));
        self.mm.push(mm);
        if let Some(accel) = frame.imu {
            self.imu.push(ctx.imu_sample(accel));
        }
    }

    pub fn mm(&self) -> &[MmSample] {
        &self.mm
    }

    pub fn px(&self) -> &[PxSample] {
        &self.px
    }

    pub fn imu(&self) -> &[ImuSample] {
        &self.imu
    }

    /// Whether any IMU rows were captured.
    pub fn has_imu(&self) -> bool {
        !self.imu.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mm.is_empty()
    }

    pub fn clear(&mut self) {
        self.mm.clear();
        self.px.clear();
        self.imu.clear();
    }
}
